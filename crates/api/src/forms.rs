//! Named fields and uploaded files from url-encoded or multipart bodies.
//!
//! Every lookup takes [`FormOptions`], and callers must pick a
//! [`FailureMode`]. `Fatal` returns the error, `Silent` logs it at debug level
//! and yields `Ok(None)`.
//!
//! A failed [`FormRequest::get_and_save_file`] can leave a truncated file behind;
//! callers should retry or discard.

use std::collections::HashMap;
use std::io::Cursor;
use std::path::{Path, PathBuf};

use axum::body::{Body, Bytes};
use axum::extract::{FromRequest, Multipart, Request};
use axum::http::request::Parts;
use axum::http::{Method, header};
use thiserror::Error;
use tokio::io::AsyncWriteExt;

/// Memory cap for a whole multipart body.
pub const MAX_MULTIPART_MEMORY: usize = 32 << 20;

/// Cap for url-encoded bodies.
pub const MAX_URLENCODED_BODY: usize = 10 << 20;

#[derive(Debug, Error)]
pub enum FormError {
    #[error("cannot parse form: {0}")]
    Parse(String),

    #[error("cannot parse form: request Content-Type isn't multipart/form-data")]
    NotMultipart,

    #[error("cannot parse form: body exceeds {limit} bytes")]
    TooLarge { limit: usize },

    #[error("cannot parse form: body already consumed")]
    BodyConsumed,

    #[error("cannot extract parameter named {0:?} in form")]
    MissingParam(String),

    #[error("number of parameters in form is incorrect. {0} != 1")]
    ParamCount(usize),

    #[error("cannot get file from form: no file named {0:?}")]
    MissingFile(String),

    #[error("cannot get file from form: unusable file name {0:?}")]
    InvalidFileName(String),

    #[error("cannot save file: {0}")]
    Save(#[source] std::io::Error),

    #[error("cannot copy data: {0}")]
    Copy(#[source] std::io::Error),
}

/// Whether to parse the body now or rely on an earlier [`FormRequest::parse`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseMode {
    ParseNow,
    AlreadyParsed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormEncoding {
    UrlEncoded,
    Multipart,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureMode {
    Fatal,
    Silent,
}

/// Per-call extraction flags. Callers always choose a failure mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormOptions {
    pub parse: ParseMode,
    pub encoding: FormEncoding,
    pub failure: FailureMode,
}

impl FormOptions {
    pub fn fatal(encoding: FormEncoding) -> Self {
        Self {
            parse: ParseMode::ParseNow,
            encoding,
            failure: FailureMode::Fatal,
        }
    }

    pub fn silent(encoding: FormEncoding) -> Self {
        Self {
            parse: ParseMode::ParseNow,
            encoding,
            failure: FailureMode::Silent,
        }
    }

    pub fn already_parsed(mut self) -> Self {
        self.parse = ParseMode::AlreadyParsed;
        self
    }
}

/// An uploaded file held in memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormFile {
    file_name: String,
    content_type: Option<String>,
    content: Bytes,
}

impl FormFile {
    /// Uploaded name with any directory components stripped.
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    pub fn bytes(&self) -> &Bytes {
        &self.content
    }

    pub fn reader(&self) -> Cursor<Bytes> {
        Cursor::new(self.content.clone())
    }
}

/// Values and files of a parsed form. Repeated names keep arrival order.
#[derive(Debug, Clone, Default)]
pub struct ParsedForm {
    values: HashMap<String, Vec<String>>,
    files: HashMap<String, Vec<FormFile>>,
    /// Field name to uploaded name, for uploads whose name has no file component.
    rejected: HashMap<String, String>,
}

impl ParsedForm {
    pub fn values(&self, name: &str) -> Option<&[String]> {
        self.values.get(name).map(Vec::as_slice)
    }

    pub fn file(&self, name: &str) -> Option<&FormFile> {
        self.files.get(name).and_then(|files| files.first())
    }

    fn push_value(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.values.entry(name.into()).or_default().push(value.into());
    }

    fn push_pairs(&mut self, raw: &[u8]) {
        for (name, value) in url::form_urlencoded::parse(raw) {
            self.push_value(name, value);
        }
    }
}

/// A request whose form can be parsed once and queried many times.
pub struct FormRequest {
    head: Parts,
    body: Option<Body>,
    form: Option<ParsedForm>,
    multipart: bool,
}

impl FormRequest {
    pub fn new(req: Request) -> Self {
        let (head, body) = req.into_parts();
        Self {
            head,
            body: Some(body),
            form: None,
            multipart: false,
        }
    }

    pub fn head(&self) -> &Parts {
        &self.head
    }

    pub fn form(&self) -> Option<&ParsedForm> {
        self.form.as_ref()
    }

    /// Parse the body (if the encoding applies) plus the query string.
    ///
    /// Body values come before query values for the same name. The form is parsed
    /// once, except that a multipart request first parsed as url-encoded is parsed
    /// again (from its untouched body) when multipart is asked for.
    pub async fn parse(&mut self, encoding: FormEncoding) -> Result<&ParsedForm, FormError> {
        let needed = match encoding {
            FormEncoding::UrlEncoded => self.form.is_none(),
            FormEncoding::Multipart => !self.multipart,
        };

        if needed {
            let form = match encoding {
                FormEncoding::UrlEncoded => parse_urlencoded(&self.head, &mut self.body).await?,
                FormEncoding::Multipart => {
                    let form = parse_multipart(&self.head, &mut self.body).await?;
                    self.multipart = true;
                    form
                }
            };
            self.form = Some(form);
        }

        Ok(self.form.get_or_insert_with(ParsedForm::default))
    }

    /// The single value of field `name`.
    pub async fn get_param(
        &mut self,
        name: &str,
        opts: FormOptions,
    ) -> Result<Option<String>, FormError> {
        let found = match self.prepare(opts.parse, opts.encoding).await {
            Ok(()) => self.lookup_param(name),
            Err(e) => Err(e),
        };
        settle(found, opts.failure)
    }

    /// The uploaded file in field `name`. Files always come from a multipart
    /// body, so `opts.encoding` is ignored.
    pub async fn get_file(
        &mut self,
        name: &str,
        opts: FormOptions,
    ) -> Result<Option<FormFile>, FormError> {
        let found = match self.prepare(opts.parse, FormEncoding::Multipart).await {
            Ok(()) => self.lookup_file(name),
            Err(e) => Err(e),
        };
        settle(found, opts.failure)
    }

    /// Store the uploaded file in field `name` as `dir/<base name>`, creating
    /// `dir` if needed. Returns the written path.
    pub async fn get_and_save_file(
        &mut self,
        dir: impl AsRef<Path>,
        name: &str,
        opts: FormOptions,
    ) -> Result<Option<PathBuf>, FormError> {
        let saved = match self.prepare(opts.parse, FormEncoding::Multipart).await {
            Ok(()) => match self.lookup_file(name) {
                Ok(file) => save_file(dir.as_ref(), &file).await,
                Err(e) => Err(e),
            },
            Err(e) => Err(e),
        };
        settle(saved, opts.failure)
    }

    async fn prepare(&mut self, mode: ParseMode, encoding: FormEncoding) -> Result<(), FormError> {
        match mode {
            ParseMode::ParseNow => self.parse(encoding).await.map(|_| ()),
            ParseMode::AlreadyParsed => Ok(()),
        }
    }

    fn lookup_param(&self, name: &str) -> Result<String, FormError> {
        let values = self
            .form
            .as_ref()
            .and_then(|form| form.values(name))
            .ok_or_else(|| FormError::MissingParam(name.to_string()))?;

        match values {
            [value] => Ok(value.clone()),
            other => Err(FormError::ParamCount(other.len())),
        }
    }

    fn lookup_file(&self, name: &str) -> Result<FormFile, FormError> {
        let form = self.form.as_ref();
        if let Some(file) = form.and_then(|form| form.file(name)) {
            return Ok(file.clone());
        }

        match form.and_then(|form| form.rejected.get(name)) {
            Some(uploaded) => Err(FormError::InvalidFileName(uploaded.clone())),
            None => Err(FormError::MissingFile(name.to_string())),
        }
    }
}

fn settle<T>(result: Result<T, FormError>, failure: FailureMode) -> Result<Option<T>, FormError> {
    match (result, failure) {
        (Ok(value), _) => Ok(Some(value)),
        (Err(e), FailureMode::Fatal) => Err(e),
        (Err(e), FailureMode::Silent) => {
            tracing::debug!(error = %e, "form extraction failed (silent)");
            Ok(None)
        }
    }
}

fn content_type(head: &Parts) -> &str {
    head.headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
}

fn declared_length(head: &Parts) -> Option<usize> {
    head.headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
}

async fn read_capped(head: &Parts, body: Body, limit: usize) -> Result<Bytes, FormError> {
    if declared_length(head).is_some_and(|len| len > limit) {
        return Err(FormError::TooLarge { limit });
    }
    axum::body::to_bytes(body, limit)
        .await
        .map_err(|e| FormError::Parse(e.to_string()))
}

/// Reads (and consumes) the body only when it is url-encoded.
async fn parse_urlencoded(head: &Parts, body: &mut Option<Body>) -> Result<ParsedForm, FormError> {
    let mut form = ParsedForm::default();

    let has_body = matches!(head.method, Method::POST | Method::PUT | Method::PATCH);
    if has_body && content_type(head).starts_with("application/x-www-form-urlencoded") {
        let body = body.take().ok_or(FormError::BodyConsumed)?;
        let raw = read_capped(head, body, MAX_URLENCODED_BODY).await?;
        form.push_pairs(&raw);
    }

    if let Some(query) = head.uri.query() {
        form.push_pairs(query.as_bytes());
    }

    Ok(form)
}

async fn parse_multipart(head: &Parts, body: &mut Option<Body>) -> Result<ParsedForm, FormError> {
    let ctype = content_type(head).to_string();
    if !ctype.starts_with("multipart/form-data") {
        return Err(FormError::NotMultipart);
    }

    let body = body.take().ok_or(FormError::BodyConsumed)?;
    let raw = read_capped(head, body, MAX_MULTIPART_MEMORY).await?;
    let mut buffered = axum::http::Request::builder()
        .method(Method::POST)
        .header(header::CONTENT_TYPE, ctype)
        .body(Body::from(raw))
        .map_err(|e| FormError::Parse(e.to_string()))?;
    // Keeps any `DefaultBodyLimit` set on the route.
    *buffered.extensions_mut() = head.extensions.clone();

    let mut multipart = Multipart::from_request(buffered, &())
        .await
        .map_err(|e| FormError::Parse(e.body_text()))?;

    let mut form = ParsedForm::default();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| FormError::Parse(e.body_text()))?
    {
        let Some(name) = field.name().map(str::to_owned) else {
            continue;
        };

        // An empty filename is an empty optional file input: a plain value.
        match field.file_name().filter(|n| !n.is_empty()).map(str::to_owned) {
            Some(uploaded) => {
                let content_type = field.content_type().map(str::to_owned);
                let content = field
                    .bytes()
                    .await
                    .map_err(|e| FormError::Parse(e.body_text()))?;
                match base_name(&uploaded) {
                    Ok(file_name) => form.files.entry(name).or_default().push(FormFile {
                        file_name,
                        content_type,
                        content,
                    }),
                    Err(_) => {
                        tracing::debug!(field = %name, uploaded = %uploaded, "upload name rejected");
                        form.rejected.insert(name, uploaded);
                    }
                }
            }
            None => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| FormError::Parse(e.body_text()))?;
                form.push_value(name, value);
            }
        }
    }

    if let Some(query) = head.uri.query() {
        form.push_pairs(query.as_bytes());
    }

    Ok(form)
}

/// Last path component of an uploaded name. `..`, `/` and empty names are refused.
fn base_name(uploaded: &str) -> Result<String, FormError> {
    Path::new(uploaded)
        .file_name()
        .and_then(|n| n.to_str())
        .map(str::to_owned)
        .ok_or_else(|| FormError::InvalidFileName(uploaded.to_string()))
}

async fn save_file(dir: &Path, file: &FormFile) -> Result<PathBuf, FormError> {
    tokio::fs::create_dir_all(dir).await.map_err(FormError::Save)?;

    let path = dir.join(file.file_name());
    let mut out = tokio::fs::File::create(&path).await.map_err(FormError::Save)?;
    out.write_all(file.bytes()).await.map_err(FormError::Copy)?;
    out.flush().await.map_err(FormError::Copy)?;

    tracing::debug!(path = %path.display(), bytes = file.bytes().len(), "upload saved");
    Ok(path)
}
