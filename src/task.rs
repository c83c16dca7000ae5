//! Scrape tasks and user input parsing
//!
//! A [`Task`] is one product-scrape-and-download unit. Its identity is the
//! pair (site, identifier); the queue uses that to reject duplicates.

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::utils::constants::{
    COMPUZONE_HOST_MARKER, DANAWA_HOST_MARKER, DANAWA_IMAGE_HOSTS, DANAWA_PRODUCT_PAGE,
};

/// Source site of a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Site {
    /// Danawa product page addressed by pcode
    Danawa,
    /// A single Danawa image URL, downloaded without visiting the product page
    DanawaImage,
    /// Compuzone product page addressed by URL
    Compuzone,
}

impl fmt::Display for Site {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Site::Danawa => "danawa",
            Site::DanawaImage => "danawa-image",
            Site::Compuzone => "compuzone",
        };
        f.write_str(name)
    }
}

/// Identity of a task: equal keys mean the same product
pub type TaskKey = (Site, String);

/// One product-scrape-and-download unit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    site: Site,
    id: String,
    url: Option<String>,
}

impl Task {
    /// Danawa product task. `url` is the page the user pasted, if any.
    pub fn danawa(pcode: impl Into<String>, url: Option<String>) -> Self {
        Self {
            site: Site::Danawa,
            id: pcode.into(),
            url,
        }
    }

    pub fn compuzone(url: impl Into<String>) -> Self {
        let url = url.into();
        Self {
            site: Site::Compuzone,
            id: url.clone(),
            url: Some(url),
        }
    }

    pub fn danawa_image(url: impl Into<String>) -> Self {
        let url = url.into();
        Self {
            site: Site::DanawaImage,
            id: url.clone(),
            url: Some(url),
        }
    }

    pub fn site(&self) -> Site {
        self.site
    }

    /// Site-specific product identifier (pcode for Danawa, URL otherwise)
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    pub fn key(&self) -> TaskKey {
        (self.site, self.id.clone())
    }

    /// Page to open for this task
    pub fn page_url(&self) -> String {
        self.url
            .clone()
            .unwrap_or_else(|| format!("{DANAWA_PRODUCT_PAGE}{}", self.id))
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.site, self.id)
    }
}

/// Summary of one processed task
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskReport {
    pub task: Task,
    /// Folder the images were saved into
    pub folder: PathBuf,
    pub saved: Vec<PathBuf>,
    /// Images that could not be fetched or written
    pub failed: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl TaskReport {
    pub fn new(task: Task, folder: PathBuf, started_at: DateTime<Utc>) -> Self {
        Self {
            task,
            folder,
            saved: Vec::new(),
            failed: 0,
            started_at,
            finished_at: started_at,
        }
    }

    pub fn finish(mut self) -> Self {
        self.finished_at = Utc::now();
        self
    }
}

/// Rejected input line
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InputError {
    #[error("Invalid Danawa URL or product code: {0}")]
    InvalidDanawa(String),

    #[error("Unsupported URL: {0}")]
    Unsupported(String),
}

fn is_digits(text: &str) -> bool {
    !text.is_empty() && text.bytes().all(|b| b.is_ascii_digit())
}

/// Detect which supported site a line of input refers to
pub fn detect_site(text: &str) -> Option<Site> {
    if text.contains(COMPUZONE_HOST_MARKER) {
        Some(Site::Compuzone)
    } else if text.contains(DANAWA_HOST_MARKER) || is_digits(text) {
        Some(Site::Danawa)
    } else {
        None
    }
}

/// Extract a Danawa pcode from a bare number or a URL's `pcode` parameter
pub fn extract_pcode(text: &str) -> Option<String> {
    if is_digits(text) {
        return Some(text.to_string());
    }
    let url = Url::parse(text).ok()?;
    url.query_pairs()
        .find(|(key, _)| key == "pcode")
        .map(|(_, value)| value.into_owned())
        .filter(|pcode| is_digits(pcode))
}

/// Direct links to Danawa-hosted JPEGs skip the product page entirely
pub fn is_direct_image_url(text: &str) -> bool {
    let Ok(url) = Url::parse(text) else {
        return false;
    };
    let host_matches = url
        .host_str()
        .is_some_and(|host| DANAWA_IMAGE_HOSTS.iter().any(|h| host.contains(h)));
    host_matches && url.path().ends_with(".jpg")
}

/// Parse one input line into a task. Blank lines yield `Ok(None)`.
pub fn parse_input(line: &str) -> Result<Option<Task>, InputError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }

    if is_direct_image_url(line) {
        return Ok(Some(Task::danawa_image(line)));
    }

    match detect_site(line) {
        Some(Site::Compuzone) => Ok(Some(Task::compuzone(line))),
        Some(_) => {
            let pcode =
                extract_pcode(line).ok_or_else(|| InputError::InvalidDanawa(line.to_string()))?;
            let url = line.starts_with("http").then(|| line.to_string());
            Ok(Some(Task::danawa(pcode, url)))
        }
        None => Err(InputError::Unsupported(line.to_string())),
    }
}

/// Parse many lines, splitting accepted tasks from rejected lines
pub fn parse_inputs<'a, I>(lines: I) -> (Vec<Task>, Vec<InputError>)
where
    I: IntoIterator<Item = &'a str>,
{
    let mut tasks = Vec::new();
    let mut errors = Vec::new();
    for line in lines {
        match parse_input(line) {
            Ok(Some(task)) => tasks.push(task),
            Ok(None) => {}
            Err(e) => errors.push(e),
        }
    }
    (tasks, errors)
}
