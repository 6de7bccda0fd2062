//! Outbound SMTP notifications. Delivery is best effort: messages go out on a
//! detached thread and failures are logged, never surfaced to the caller of
//! the HTTP request that produced them.

use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use log::{debug, error, warn};
use std::thread;

use crate::config::AppConfig;
use crate::error::AppError;

pub struct MailContent {
    pub subject: String,
    pub body: String,
}

#[derive(Clone)]
pub struct Mailer {
    transport: Option<SmtpTransport>,
    sender: String,
}

impl Mailer {
    pub fn from_config(config: &AppConfig) -> Self {
        let transport = match (&config.smtp_username, &config.smtp_password) {
            (Some(user), Some(pass)) => match SmtpTransport::starttls_relay(&config.smtp_host) {
                Ok(builder) => Some(
                    builder
                        .port(config.smtp_port)
                        .credentials(Credentials::new(user.clone(), pass.clone()))
                        .build(),
                ),
                Err(e) => {
                    error!("smtp transport init failed: {}", e);
                    None
                }
            },
            _ => {
                warn!("MAIL_USERNAME/MAIL_PASSWORD not set, email notifications disabled");
                None
            }
        };

        Self {
            transport,
            sender: config.mail_sender.clone(),
        }
    }

    /// Queues a message on a background thread. Returns an error only for
    /// problems found before dispatch (bad addresses, unbuildable message);
    /// transport failures are logged from the sending thread.
    pub fn send(&self, to: &str, content: &MailContent) -> Result<(), AppError> {
        let transport = match &self.transport {
            Some(t) => t.clone(),
            None => {
                debug!("email disabled, dropping \"{}\" for {}", content.subject, to);
                return Ok(());
            }
        };

        let from: Mailbox = self
            .sender
            .parse()
            .map_err(|e| AppError::Email(format!("adresse expéditeur invalide: {}", e)))?;
        let to_mailbox: Mailbox = to
            .parse()
            .map_err(|e| AppError::Email(format!("adresse destinataire invalide: {}", e)))?;

        let message = Message::builder()
            .from(from)
            .to(to_mailbox)
            .subject(&content.subject)
            .header(ContentType::TEXT_PLAIN)
            .body(content.body.clone())
            .map_err(|e| AppError::Email(format!("construction du message impossible: {}", e)))?;

        let subject = content.subject.clone();
        let recipient = to.to_string();
        thread::spawn(move || {
            if let Err(e) = transport.send(&message) {
                error!("failed to send email \"{}\" to {}: {}", subject, recipient, e);
            }
        });
        Ok(())
    }
}

pub fn welcome_mail(app_name: &str, full_name: &str, email: &str, initial_password: &str) -> MailContent {
    MailContent {
        subject: format!("Bienvenue sur {}", app_name),
        body: format!(
            "Bonjour {},\n\n\
             Bienvenue sur la plateforme de gestion scolaire!\n\n\
             Voici vos identifiants de connexion:\n\
             - Email: {}\n\
             - Mot de passe temporaire: {}\n\n\
             Veuillez vous connecter et changer votre mot de passe lors de votre première connexion.\n\n\
             Cordialement,\n\
             L'équipe administrative\n",
            full_name, email, initial_password
        ),
    }
}

pub fn threshold_warning_mail(
    full_name: &str,
    module_name: &str,
    current_hours: f64,
    threshold_hours: f64,
    percentage: i64,
) -> MailContent {
    MailContent {
        subject: format!("Alerte Absence - {}% du seuil atteint", percentage),
        body: format!(
            "Bonjour {},\n\n\
             Ceci est une notification automatique concernant vos absences.\n\n\
             Module: {}\n\
             Heures d'absence actuelles: {}h\n\
             Seuil maximum: {}h\n\
             Pourcentage atteint: {}%\n\n\
             Vous avez atteint {}% de votre quota d'absences autorisées pour ce module.\n\
             Veuillez être vigilant(e) et éviter d'autres absences.\n\n\
             Cordialement,\n\
             L'équipe administrative\n",
            full_name, module_name, current_hours, threshold_hours, percentage, percentage
        ),
    }
}

pub fn threshold_exceeded_mail(
    full_name: &str,
    module_name: &str,
    current_hours: f64,
    threshold_hours: f64,
) -> MailContent {
    MailContent {
        subject: format!("URGENT - Seuil d'absence dépassé pour {}", module_name),
        body: format!(
            "Bonjour {},\n\n\
             ATTENTION: Vous avez dépassé le seuil d'absences autorisées.\n\n\
             Module: {}\n\
             Heures d'absence: {}h\n\
             Seuil maximum: {}h\n\
             Dépassement: {}h\n\n\
             Le dépassement du seuil d'absences peut entraîner des conséquences académiques.\n\
             Veuillez contacter l'administration dans les plus brefs délais.\n\n\
             Cordialement,\n\
             L'équipe administrative\n",
            full_name, module_name, current_hours, threshold_hours,
            current_hours - threshold_hours
        ),
    }
}
