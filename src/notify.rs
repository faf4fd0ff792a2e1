//! QR-code email notification.
//!
//! After a student registers, the front end asks for an email carrying their
//! QR code. The flow is:
//!
//! ```text
//! NotificationRequest ─▶ validate ─▶ fetch QR bytes ─▶ compose MIME ─▶ MailTransport
//!  (JSON body)            (400)       (http/https)      (multipart/related)
//! ```
//!
//! The message has a plain-text alternative and an HTML body that shows the
//! QR inline via `cid:qr_image`; the same image is attached as `qr_code.png`.
//!
//! Delivery is behind [`MailTransport`]. The shipped [`PickupDirTransport`]
//! drops finished `.eml` files into a directory that a local MTA relays.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::Url;
use serde::Deserialize;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

/// Subject line of every notification.
pub const SUBJECT: &str = "QR Code Siswa";

/// Content-ID the HTML body uses to reference the inline QR image.
pub const QR_CONTENT_ID: &str = "qr_image";

/// File name of the QR attachment.
pub const QR_FILE_NAME: &str = "qr_code.png";

/// Largest QR image accepted from `qr_url`.
pub const MAX_QR_BYTES: usize = 2 * 1024 * 1024;

/// Longest accepted value for any request field.
const MAX_FIELD_LEN: usize = 256;

const BASE64_LINE: usize = 76;

/// Errors raised on the notification path.
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("Missing required field '{0}'")]
    MissingField(&'static str),

    #[error("Field '{field}' is invalid: {reason}")]
    InvalidField { field: &'static str, reason: String },

    #[error("Failed to fetch QR code from {url}: {detail}")]
    QrFetch { url: String, detail: String },

    #[error("Failed to deliver message to '{path}': {source}")]
    Delivery {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl NotifyError {
    /// True when the caller sent an unusable request, as opposed to a failure
    /// while fetching or delivering.
    pub fn is_invalid_request(&self) -> bool {
        matches!(
            self,
            NotifyError::MissingField(_) | NotifyError::InvalidField { .. }
        )
    }
}

/// The JSON body of a notification request, as received.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NotificationRequest {
    pub email: Option<String>,
    pub nama: Option<String>,
    pub kelas: Option<String>,
    pub jurusan: Option<String>,
    pub qr_url: Option<String>,
}

/// A request whose fields have all been checked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub email: String,
    pub nama: String,
    pub kelas: String,
    pub jurusan: String,
    pub qr_url: Url,
}

impl NotificationRequest {
    pub fn validate(self) -> Result<Notification, NotifyError> {
        let email = required("email", self.email)?;
        check_email(&email)?;
        let nama = required("nama", self.nama)?;
        let kelas = required("kelas", self.kelas)?;
        let jurusan = required("jurusan", self.jurusan)?;
        let raw_url = required("qr_url", self.qr_url)?;

        let qr_url = Url::parse(&raw_url).map_err(|e| NotifyError::InvalidField {
            field: "qr_url",
            reason: e.to_string(),
        })?;
        if !matches!(qr_url.scheme(), "http" | "https") {
            return Err(NotifyError::InvalidField {
                field: "qr_url",
                reason: format!("scheme '{}' is not http or https", qr_url.scheme()),
            });
        }

        Ok(Notification {
            email,
            nama,
            kelas,
            jurusan,
            qr_url,
        })
    }
}

fn required(field: &'static str, value: Option<String>) -> Result<String, NotifyError> {
    let value = value.map(|v| v.trim().to_string()).unwrap_or_default();
    if value.is_empty() {
        return Err(NotifyError::MissingField(field));
    }
    if value.len() > MAX_FIELD_LEN {
        return Err(NotifyError::InvalidField {
            field,
            reason: format!("longer than {MAX_FIELD_LEN} bytes"),
        });
    }
    if value.chars().any(|c| c.is_control()) {
        return Err(NotifyError::InvalidField {
            field,
            reason: "contains control characters".into(),
        });
    }
    Ok(value)
}

fn check_email(email: &str) -> Result<(), NotifyError> {
    let invalid = |reason: &str| NotifyError::InvalidField {
        field: "email",
        reason: reason.to_string(),
    };
    if email
        .chars()
        .any(|c| c.is_whitespace() || matches!(c, '<' | '>' | ',' | ';' | '"'))
    {
        return Err(invalid("contains characters not allowed in an address"));
    }
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() && !domain.contains('@') => {
            Ok(())
        }
        _ => Err(invalid("expected local@domain")),
    }
}

/// Download the QR image referenced by a notification.
pub async fn fetch_qr(client: &reqwest::Client, url: &Url) -> Result<Vec<u8>, NotifyError> {
    let fetch_err = |detail: String| NotifyError::QrFetch {
        url: url.to_string(),
        detail,
    };

    debug!("Fetching QR code from {}", url);
    let response = client
        .get(url.clone())
        .send()
        .await
        .map_err(|e| fetch_err(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        return Err(fetch_err(format!("HTTP {status}")));
    }
    if let Some(len) = response.content_length() {
        if len as usize > MAX_QR_BYTES {
            return Err(fetch_err(format!("image is {len} bytes, over the limit")));
        }
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| fetch_err(e.to_string()))?;
    if bytes.is_empty() {
        return Err(fetch_err("empty response body".into()));
    }
    if bytes.len() > MAX_QR_BYTES {
        return Err(fetch_err(format!(
            "image is {} bytes, over the limit",
            bytes.len()
        )));
    }
    Ok(bytes.to_vec())
}

/// A composed notification, ready for a transport.
#[derive(Debug, Clone)]
pub struct MailMessage {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub text: String,
    pub html: String,
    pub qr_png: Vec<u8>,
}

/// Build the notification message for `n`.
pub fn compose(n: &Notification, from: &str, qr_png: Vec<u8>) -> MailMessage {
    let text = format!(
        "Halo {nama},\n\
         \n\
         Data pendaftaran kamu berhasil disimpan:\n\
         - Kelas: {kelas}\n\
         - Jurusan: {jurusan}\n\
         \n\
         Berikut QR Code kamu:\n\
         {url}\n\
         \n\
         Untuk mengunduh QR Code, silakan lihat lampiran email ini.\n",
        nama = n.nama,
        kelas = n.kelas,
        jurusan = n.jurusan,
        url = n.qr_url,
    );

    let html = format!(
        "<html>\n\
         <body>\n\
         <p>Halo {nama},</p>\n\
         \n\
         <p>Data pendaftaran kamu berhasil disimpan:</p>\n\
         <ul>\n\
         <li>Kelas: {kelas}</li>\n\
         <li>Jurusan: {jurusan}</li>\n\
         </ul>\n\
         \n\
         <p>Berikut QR Code kamu:</p>\n\
         <img src=\"cid:{cid}\" alt=\"QR Code\" style=\"max-width: 300px;\">\n\
         \n\
         <p>Untuk mengunduh QR Code, silakan lihat lampiran email ini.</p>\n\
         </body>\n\
         </html>\n",
        nama = escape_html(&n.nama),
        kelas = escape_html(&n.kelas),
        jurusan = escape_html(&n.jurusan),
        cid = QR_CONTENT_ID,
    );

    MailMessage {
        from: from.to_string(),
        to: n.email.clone(),
        subject: SUBJECT.to_string(),
        text,
        html,
        qr_png,
    }
}

/// Escape the five HTML-significant characters.
pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

impl MailMessage {
    /// Render as an RFC 5322 message with CRLF line endings.
    ///
    /// ```text
    /// multipart/related
    /// ├─ multipart/alternative
    /// │  ├─ text/plain
    /// │  └─ text/html      (<img src="cid:qr_image">)
    /// └─ image/png         (Content-ID: <qr_image>, qr_code.png)
    /// ```
    pub fn to_mime(&self) -> String {
        let id = uuid::Uuid::new_v4().simple().to_string();
        let related = format!("related-{id}");
        let alternative = format!("alt-{id}");
        let domain = self
            .from
            .rsplit_once('@')
            .map(|(_, d)| d.trim_end_matches('>'))
            .unwrap_or("localhost");

        let mut m = String::new();
        let mut line = |s: &str| {
            m.push_str(s);
            m.push_str("\r\n");
        };

        line(&format!("From: {}", self.from));
        line(&format!("To: {}", self.to));
        line(&format!("Subject: {}", self.subject));
        line(&format!("Date: {}", chrono::Utc::now().to_rfc2822()));
        line(&format!("Message-ID: <{id}@{domain}>"));
        line("MIME-Version: 1.0");
        line(&format!(
            "Content-Type: multipart/related; boundary=\"{related}\"; type=\"multipart/alternative\""
        ));
        line("");

        line(&format!("--{related}"));
        line(&format!(
            "Content-Type: multipart/alternative; boundary=\"{alternative}\""
        ));
        line("");

        for (mime, body) in [("text/plain", &self.text), ("text/html", &self.html)] {
            line(&format!("--{alternative}"));
            line(&format!("Content-Type: {mime}; charset=utf-8"));
            line("Content-Transfer-Encoding: base64");
            line("");
            for chunk in wrap_base64(body.as_bytes()) {
                line(&chunk);
            }
        }
        line(&format!("--{alternative}--"));
        line("");

        line(&format!("--{related}"));
        line(&format!("Content-Type: image/png; name=\"{QR_FILE_NAME}\""));
        line("Content-Transfer-Encoding: base64");
        line(&format!("Content-ID: <{QR_CONTENT_ID}>"));
        line(&format!(
            "Content-Disposition: inline; filename=\"{QR_FILE_NAME}\""
        ));
        line("");
        for chunk in wrap_base64(&self.qr_png) {
            line(&chunk);
        }
        line(&format!("--{related}--"));

        m
    }
}

fn wrap_base64(bytes: &[u8]) -> Vec<String> {
    let encoded = STANDARD.encode(bytes);
    encoded
        .as_bytes()
        .chunks(BASE64_LINE)
        .map(|c| String::from_utf8_lossy(c).into_owned())
        .collect()
}

/// Hands a composed message to whatever delivers mail.
#[async_trait]
pub trait MailTransport: Send + Sync {
    async fn send(&self, message: &MailMessage) -> Result<(), NotifyError>;
}

/// Writes each message as an `.eml` file into a pickup directory.
///
/// Files appear atomically: the message is written under a `.tmp` name and
/// renamed, so a relay watching the directory never sees half a message.
#[derive(Debug, Clone)]
pub struct PickupDirTransport {
    dir: PathBuf,
}

impl PickupDirTransport {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[async_trait]
impl MailTransport for PickupDirTransport {
    async fn send(&self, message: &MailMessage) -> Result<(), NotifyError> {
        let delivery_err = |path: &Path, source| NotifyError::Delivery {
            path: path.to_path_buf(),
            source,
        };

        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| delivery_err(&self.dir, e))?;

        let stem = format!(
            "{}-{}",
            chrono::Utc::now().format("%Y%m%dT%H%M%S"),
            uuid::Uuid::new_v4().simple()
        );
        let final_path = self.dir.join(format!("{stem}.eml"));
        let tmp_path = self.dir.join(format!("{stem}.eml.tmp"));

        tokio::fs::write(&tmp_path, message.to_mime())
            .await
            .map_err(|e| delivery_err(&tmp_path, e))?;
        if let Err(e) = tokio::fs::rename(&tmp_path, &final_path).await {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(delivery_err(&final_path, e));
        }

        info!("Queued notification for {} at {}", message.to, final_path.display());
        Ok(())
    }
}

/// Validates, fetches, composes, and delivers notifications.
#[derive(Clone)]
pub struct Notifier {
    client: reqwest::Client,
    transport: Arc<dyn MailTransport>,
    from: String,
}

impl Notifier {
    /// `qr_fetch_timeout` bounds the whole QR download.
    pub fn new(
        transport: Arc<dyn MailTransport>,
        from: impl Into<String>,
        qr_fetch_timeout: Duration,
    ) -> Result<Self, NotifyError> {
        let client = reqwest::Client::builder()
            .timeout(qr_fetch_timeout)
            .build()
            .map_err(|e| NotifyError::Internal(format!("HTTP client: {e}")))?;
        Ok(Self {
            client,
            transport,
            from: from.into(),
        })
    }

    pub async fn notify(&self, request: NotificationRequest) -> Result<(), NotifyError> {
        let n = request.validate()?;
        let qr = fetch_qr(&self.client, &n.qr_url).await?;
        let message = compose(&n, &self.from, qr);
        self.transport.send(&message).await
    }
}
