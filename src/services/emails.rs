use std::env;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;

/// Passerelle d'envoi d'emails transactionnels.
/// Abstraite en trait pour pouvoir substituer un double dans les tests.
#[async_trait]
pub trait EmailSender: Send + Sync {
    /// Envoie un email et retourne true en cas de succès.
    /// Ne doit jamais paniquer : les échecs sont loggés côté implémentation.
    async fn send_email(&self, to: &str, subject: &str, html_body: &str) -> bool;
}

/// Client Postmark (https://api.postmarkapp.com/email)
pub struct PostmarkClient {
    api_key: String,
    sender_email: String,
    api_url: String,
    http: reqwest::Client,
}

impl PostmarkClient {
    pub fn from_env() -> Self {
        PostmarkClient {
            api_key: env::var("POSTMARK_API_KEY").unwrap_or_default(),
            sender_email: env::var("POSTMARK_SENDER_EMAIL").unwrap_or_default(),
            api_url: "https://api.postmarkapp.com/email".to_string(),
            http: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl EmailSender for PostmarkClient {
    async fn send_email(&self, to: &str, subject: &str, html_body: &str) -> bool {
        let payload = serde_json::json!({
            "From": self.sender_email,
            "To": to,
            "Subject": subject,
            "HtmlBody": html_body,
            "MessageStream": "outbound",
        });

        let result = self
            .http
            .post(&self.api_url)
            .header("Accept", "application/json")
            .header("X-Postmark-Server-Token", &self.api_key)
            .json(&payload)
            .send()
            .await;

        match result {
            Ok(response) if response.status().is_success() => true,
            Ok(response) => {
                log::error!("Postmark a répondu {} pour l'envoi à {}", response.status(), to);
                false
            }
            Err(e) => {
                log::error!("Échec de l'appel Postmark pour {}: {}", to, e);
                false
            }
        }
    }
}

/// Emails du cycle de vie des comptes : bienvenue, vérification, reset.
/// Charge un template HTML, remplace les placeholders et délègue l'envoi
/// à la passerelle injectée.
pub struct AccountEmails {
    sender: Arc<dyn EmailSender>,
    templates_dir: PathBuf,
}

impl AccountEmails {
    pub fn new(sender: Arc<dyn EmailSender>, templates_dir: PathBuf) -> Self {
        AccountEmails {
            sender,
            templates_dir,
        }
    }

    /// Email de bienvenue envoyé à l'inscription (contient le lien de
    /// vérification)
    pub async fn send_welcome_email(
        &self,
        to_email: &str,
        first_name: &str,
        verification_link: &str,
    ) -> bool {
        let subject = "Welcome to Human Link!";
        let values = [
            ("first_name", first_name),
            ("verification_link", verification_link),
        ];

        match self.process_template("welcome.html", &values) {
            Some(html) => self.sender.send_email(to_email, subject, &html).await,
            None => {
                log::error!("Impossible de traiter le template d'email pour {}", to_email);
                false
            }
        }
    }

    /// Renvoi du lien de vérification (même template que la bienvenue)
    pub async fn send_email_verification(
        &self,
        to_email: &str,
        first_name: &str,
        verification_link: &str,
    ) -> bool {
        let subject = "Verify Your Email - Human Link";
        let values = [
            ("first_name", first_name),
            ("verification_link", verification_link),
        ];

        match self.process_template("welcome.html", &values) {
            Some(html) => self.sender.send_email(to_email, subject, &html).await,
            None => {
                log::error!("Impossible de traiter le template d'email pour {}", to_email);
                false
            }
        }
    }

    /// Email de réinitialisation de mot de passe
    pub async fn send_password_reset_email(
        &self,
        to_email: &str,
        first_name: &str,
        reset_link: &str,
    ) -> bool {
        let subject = "Reset Your Password - Human Link";
        let values = [("first_name", first_name), ("reset_link", reset_link)];

        match self.process_template("forget-password.html", &values) {
            Some(html) => self.sender.send_email(to_email, subject, &html).await,
            None => {
                log::error!(
                    "Impossible de traiter le template de reset password pour {}",
                    to_email
                );
                false
            }
        }
    }

    /// Lit un template HTML et remplace les placeholders par les valeurs.
    /// Supporte les deux formats {{ key }} et {{key}}.
    fn process_template(&self, file_name: &str, values: &[(&str, &str)]) -> Option<String> {
        let path = self.templates_dir.join(file_name);

        match fs::read_to_string(&path) {
            Ok(mut template) => {
                for (key, value) in values {
                    template = template.replace(&format!("{{{{ {} }}}}", key), value);
                    template = template.replace(&format!("{{{{{}}}}}", key), value);
                }
                Some(template)
            }
            Err(e) => {
                log::error!("Template email introuvable: {}: {}", path.display(), e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct RecordingSender {
        sent: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl EmailSender for RecordingSender {
        async fn send_email(&self, to: &str, subject: &str, _html_body: &str) -> bool {
            self.sent
                .lock()
                .unwrap()
                .push((to.to_string(), subject.to_string()));
            true
        }
    }

    fn templates_dir() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("emails_templates")
    }

    #[test]
    fn test_process_template_replaces_placeholders() {
        let emails = AccountEmails::new(
            Arc::new(RecordingSender {
                sent: Mutex::new(Vec::new()),
            }),
            templates_dir(),
        );

        let html = emails
            .process_template(
                "welcome.html",
                &[
                    ("first_name", "Sibo"),
                    ("verification_link", "http://x/verify?token=t"),
                ],
            )
            .unwrap();

        assert!(html.contains("Sibo"));
        assert!(html.contains("http://x/verify?token=t"));
        assert!(!html.contains("{{"));
    }

    #[test]
    fn test_missing_template_returns_none() {
        let emails = AccountEmails::new(
            Arc::new(RecordingSender {
                sent: Mutex::new(Vec::new()),
            }),
            templates_dir(),
        );

        assert!(emails.process_template("missing.html", &[]).is_none());
    }

    #[tokio::test]
    async fn test_reset_email_goes_through_sender() {
        let sender = Arc::new(RecordingSender {
            sent: Mutex::new(Vec::new()),
        });
        let emails = AccountEmails::new(sender.clone(), templates_dir());

        let sent = emails
            .send_password_reset_email("a@b.com", "A", "http://x/reset?token=t")
            .await;

        assert!(sent);
        let log = sender.sent.lock().unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].0, "a@b.com");
        assert_eq!(log[0].1, "Reset Your Password - Human Link");
    }
}
