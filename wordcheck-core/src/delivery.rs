//! # Envio do Relatório
//!
//! Monta o e-mail com o resultado da verificação e o entrega por um
//! [`DeliveryChannel`]:
//!
//! - [`SmtpDelivery`]: relay SMTP com STARTTLS e credenciais do ambiente;
//! - [`OutboxDelivery`]: grava arquivos `.eml` num diretório local, usado
//!   quando não há credenciais configuradas.
//!
//! A mensagem tem corpo texto + HTML (explicando as cores) e dois anexos: o
//! manuscrito original (ou o texto colado, regenerado como `text_check.txt`)
//! e a planilha exportada.

use std::path::{Path, PathBuf};

use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MultiPart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{FileTransport, Message, SmtpTransport, Transport};
use tracing::info;

use crate::config::MailSettings;
use crate::document::{DocumentFormat, ManuscriptInput};
use crate::error::DeliveryError;

/// Nome do anexo quando o manuscrito veio como texto colado.
pub const TEXT_ATTACHMENT_NAME: &str = "text_check.txt";

const XLSX_MIME: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";
const FALLBACK_SENDER: &str = "wordcheck@localhost";

/// Um canal de entrega de relatórios.
pub trait DeliveryChannel: Send + Sync {
    fn name(&self) -> &str;

    /// Envia a mensagem; devolve um identificador para log.
    fn deliver(&self, mail: &ReportMail) -> Result<String, DeliveryError>;
}

/// Um arquivo anexado.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailAttachment {
    pub filename: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl MailAttachment {
    /// Anexo do manuscrito: o arquivo enviado, ou o texto como `text_check.txt`.
    pub fn source(input: &ManuscriptInput) -> Self {
        match input {
            ManuscriptInput::Text(text) => Self {
                filename: TEXT_ATTACHMENT_NAME.to_string(),
                content_type: DocumentFormat::PlainText.mime_type().to_string(),
                bytes: text.as_bytes().to_vec(),
            },
            ManuscriptInput::Document { name, bytes } => Self {
                filename: name.clone(),
                content_type: DocumentFormat::from_name(name)
                    .map(|f| f.mime_type())
                    .unwrap_or("application/octet-stream")
                    .to_string(),
                bytes: bytes.clone(),
            },
        }
    }

    /// Anexo da planilha exportada.
    pub fn report(path: &Path) -> Result<Self, DeliveryError> {
        let bytes = std::fs::read(path).map_err(|source| DeliveryError::Attachment {
            path: path.to_path_buf(),
            source,
        })?;
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "caution_words.xlsx".to_string());
        Ok(Self {
            filename,
            content_type: XLSX_MIME.to_string(),
            bytes,
        })
    }
}

/// O e-mail com o resultado da verificação.
#[derive(Debug, Clone)]
pub struct ReportMail {
    pub to: String,
    pub subject: String,
    pub plain: String,
    pub html: String,
    pub attachments: Vec<MailAttachment>,
}

/// Normaliza e valida o endereço do destinatário.
pub fn validate_recipient(to: &str) -> Result<String, DeliveryError> {
    let to = to.trim();
    if to.is_empty() {
        return Err(DeliveryError::MissingRecipient);
    }
    to.parse::<Mailbox>()?;
    Ok(to.to_string())
}

impl ReportMail {
    /// Compõe a mensagem padrão. Destinatário vazio é erro.
    pub fn compose(
        to: &str,
        settings: &MailSettings,
        source: MailAttachment,
        report: MailAttachment,
    ) -> Result<Self, DeliveryError> {
        let to = validate_recipient(to)?;

        Ok(Self {
            to,
            subject: settings.subject.clone(),
            plain: plain_body(),
            html: html_body(&settings.news_site),
            attachments: vec![source, report],
        })
    }

    /// Converte para a mensagem MIME.
    pub fn to_message(&self, from: &str) -> Result<Message, DeliveryError> {
        let mut body = MultiPart::mixed().multipart(MultiPart::alternative_plain_html(
            self.plain.clone(),
            self.html.clone(),
        ));
        for attachment in &self.attachments {
            let content_type = ContentType::parse(&attachment.content_type)
                .map_err(|e| DeliveryError::Message(format!("{}: {e}", attachment.content_type)))?;
            body = body.singlepart(
                Attachment::new(attachment.filename.clone()).body(attachment.bytes.clone(), content_type),
            );
        }

        Message::builder()
            .from(from.parse::<Mailbox>()?)
            .to(self.to.parse::<Mailbox>()?)
            .subject(self.subject.clone())
            .multipart(body)
            .map_err(|e| DeliveryError::Message(e.to_string()))
    }
}

fn plain_body() -> String {
    "原稿をテキスト分析して固有表現を抽出し、ニュース検索の件数から一致度をチェックしました。\n\
     カウント0(ピンク)、カウント10未満(オレンジ)は要確認ワードです。\n"
        .to_string()
}

fn html_body(news_site: &str) -> String {
    format!(
        "<html>\n  <head></head>\n  <body>\n    \
         <p>原稿をテキスト分析して、固有表現を抽出しました。</p>\n    \
         <p>ニュースのキーワード検索結果の件数(count)から一致度をチェックしました。</p>\n    \
         <p><span style=\"background-color: #FFC0CB\">カウント0(ピンク)</span>、\
         <span style=\"background-color: #FFA500\">カウント10未満(オレンジ)</span>は要確認ワードです。<br>\n    \
         <a href=\"{news_site}\">{news_site}</a></p>\n  </body>\n</html>\n"
    )
}

/// Entrega por relay SMTP (STARTTLS).
pub struct SmtpDelivery {
    transport: SmtpTransport,
    from: String,
}

impl SmtpDelivery {
    pub fn new(settings: &MailSettings) -> Result<Self, DeliveryError> {
        let (Some(username), Some(password)) = (&settings.username, &settings.password) else {
            return Err(DeliveryError::Message("credenciais SMTP ausentes".into()));
        };
        let transport = SmtpTransport::starttls_relay(&settings.smtp_host)?
            .port(settings.smtp_port)
            .credentials(Credentials::new(username.clone(), password.clone()))
            .build();
        let from = settings.from_address().unwrap_or(username.as_str()).to_string();
        Ok(Self { transport, from })
    }
}

impl DeliveryChannel for SmtpDelivery {
    fn name(&self) -> &str {
        "smtp"
    }

    fn deliver(&self, mail: &ReportMail) -> Result<String, DeliveryError> {
        let message = mail.to_message(&self.from)?;
        let response = self.transport.send(&message)?;
        let receipt = response.message().collect::<Vec<_>>().join(" ");
        info!(to = %mail.to, code = %response.code(), "E-mail enviado");
        Ok(receipt)
    }
}

/// Grava a mensagem como `.eml` num diretório.
pub struct OutboxDelivery {
    dir: PathBuf,
    from: String,
}

impl OutboxDelivery {
    pub fn new(dir: impl Into<PathBuf>, from: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            from: from.into(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl DeliveryChannel for OutboxDelivery {
    fn name(&self) -> &str {
        "outbox"
    }

    fn deliver(&self, mail: &ReportMail) -> Result<String, DeliveryError> {
        let message = mail.to_message(&self.from)?;
        std::fs::create_dir_all(&self.dir).map_err(|source| DeliveryError::Attachment {
            path: self.dir.clone(),
            source,
        })?;
        let id = FileTransport::new(&self.dir).send(&message)?;
        info!(to = %mail.to, dir = %self.dir.display(), id = %id, "E-mail gravado na caixa de saída");
        Ok(id)
    }
}

/// SMTP quando há credenciais, caixa de saída local caso contrário.
pub fn channel_from_settings(settings: &MailSettings) -> Result<Box<dyn DeliveryChannel>, DeliveryError> {
    if settings.has_credentials() {
        Ok(Box::new(SmtpDelivery::new(settings)?))
    } else {
        let from = settings.from_address().unwrap_or(FALLBACK_SENDER);
        Ok(Box::new(OutboxDelivery::new(settings.outbox_dir.clone(), from)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report_attachment() -> MailAttachment {
        MailAttachment {
            filename: "caution_words.xlsx".into(),
            content_type: XLSX_MIME.into(),
            bytes: vec![0x50, 0x4b, 0x03, 0x04],
        }
    }

    #[test]
    fn test_text_input_becomes_text_check_attachment() {
        let attachment = MailAttachment::source(&ManuscriptInput::text("東京都で会議"));
        assert_eq!(attachment.filename, TEXT_ATTACHMENT_NAME);
        assert_eq!(attachment.bytes, "東京都で会議".as_bytes());
    }

    #[test]
    fn test_document_input_keeps_original_file() {
        let input = ManuscriptInput::document("原稿.docx", vec![1, 2, 3]);
        let attachment = MailAttachment::source(&input);
        assert_eq!(attachment.filename, "原稿.docx");
        assert_eq!(attachment.bytes, vec![1, 2, 3]);
        assert!(attachment.content_type.contains("wordprocessingml"));
    }

    #[test]
    fn test_missing_recipient() {
        let settings = MailSettings::default();
        let source = MailAttachment::source(&ManuscriptInput::text("x"));
        let result = ReportMail::compose("  ", &settings, source, report_attachment());
        assert!(matches!(result, Err(DeliveryError::MissingRecipient)));
    }

    #[test]
    fn test_invalid_recipient() {
        let settings = MailSettings::default();
        let source = MailAttachment::source(&ManuscriptInput::text("x"));
        let result = ReportMail::compose("not-an-address", &settings, source, report_attachment());
        assert!(matches!(result, Err(DeliveryError::Address(_))));
    }

    #[test]
    fn test_validate_recipient() {
        assert_eq!(validate_recipient(" editor@example.jp ").unwrap(), "editor@example.jp");
        assert!(matches!(validate_recipient(""), Err(DeliveryError::MissingRecipient)));
        assert!(matches!(validate_recipient("editor@"), Err(DeliveryError::Address(_))));
    }

    #[test]
    fn test_compose_defaults() {
        let settings = MailSettings::default();
        let source = MailAttachment::source(&ManuscriptInput::text("x"));
        let mail = ReportMail::compose("editor@example.com", &settings, source, report_attachment()).unwrap();
        assert_eq!(mail.subject, "注意ワードのチェック");
        assert_eq!(mail.attachments.len(), 2);
        assert_eq!(mail.attachments[1].filename, "caution_words.xlsx");
        assert!(mail.html.contains(&settings.news_site));
        assert!(mail.html.contains("#FFC0CB"));
    }

    #[test]
    fn test_report_attachment_missing_file() {
        let result = MailAttachment::report(Path::new("/nonexistent/caution_words.xlsx"));
        assert!(matches!(result, Err(DeliveryError::Attachment { .. })));
    }

    #[test]
    fn test_outbox_writes_eml() {
        let dir = tempfile::tempdir().unwrap();
        let outbox = OutboxDelivery::new(dir.path().join("outbox"), "wordcheck@example.com");
        let settings = MailSettings::default();
        let source = MailAttachment::source(&ManuscriptInput::text("東京都で会議が開かれた。"));
        let mail = ReportMail::compose("editor@example.com", &settings, source, report_attachment()).unwrap();

        let id = outbox.deliver(&mail).unwrap();
        let eml = std::fs::read_to_string(outbox.dir().join(format!("{id}.eml"))).unwrap();
        assert!(eml.contains("editor@example.com"));
        assert!(eml.contains("multipart/mixed"));
        assert!(eml.contains(XLSX_MIME));
    }

    #[test]
    fn test_channel_without_credentials_is_outbox() {
        let settings = MailSettings::default();
        let channel = channel_from_settings(&settings).unwrap();
        assert_eq!(channel.name(), "outbox");
    }
}
