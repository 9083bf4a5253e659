use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use url::Url;

use crate::error::{FetchError, FetchResult};
use crate::utils::file_name_component;

pub const DEFAULT_SERVICE_BASE: &str = "https://drive.google.com/uc";

/// Cookie prefix the host sets alongside the virus-scan warning page.
pub(crate) const WARNING_COOKIE_PREFIX: &str = "download_warning";

static NO_PUBLIC_LINK: &str = "cannot retrieve the public link of the file; \
    the file may need to be shared as 'Anyone with the link', or it has had too many accesses";

/// Opaque token naming a file in the host's namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceIdentifier(String);

impl ResourceIdentifier {
    /// Takes a bare token verbatim, or pulls the id out of a drive/docs share link.
    pub fn parse(input: &str) -> FetchResult<Self> {
        let input = input.trim();
        if input.is_empty() {
            return Err(FetchError::invalid(input, "identifier is empty"));
        }
        match Url::parse(input) {
            Ok(link) if is_google_link(&link) => match id_from_link(&link) {
                Some(id) => Ok(ResourceIdentifier(id)),
                None => Err(FetchError::invalid(input, "no file id found in link")),
            },
            _ => Ok(ResourceIdentifier(input.to_string())),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn is_google_link(link: &Url) -> bool {
    matches!(link.scheme(), "http" | "https")
        && link
            .host_str()
            .map(|h| h == "google.com" || h.ends_with(".google.com"))
            .unwrap_or(false)
}

fn id_from_link(link: &Url) -> Option<String> {
    if let Some((_, id)) = link.query_pairs().find(|(k, _)| k == "id") {
        if !id.is_empty() {
            return Some(id.into_owned());
        }
    }
    let segments: Vec<&str> = link.path_segments()?.collect();
    segments
        .windows(2)
        .find(|pair| pair[0] == "d" && !pair[1].is_empty())
        .map(|pair| pair[1].to_string())
}

/// `<service-base>?id=<identifier>`, built once per fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadRequest {
    url: Url,
}

impl DownloadRequest {
    pub fn new(service_base: &Url, identifier: &ResourceIdentifier) -> Self {
        let mut url = service_base.clone();
        url.query_pairs_mut().append_pair("id", identifier.as_str());
        DownloadRequest { url }
    }

    pub fn url(&self) -> &Url {
        &self.url
    }
}

/// What an HTML page served in place of the file tells us to do next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Interstitial {
    Follow(Url),
    Rejected(String),
}

fn cached(cell: &'static OnceLock<Regex>, pattern: &str) -> &'static Regex {
    cell.get_or_init(|| Regex::new(pattern).expect("static pattern"))
}

pub(crate) fn parse_interstitial(page: &str, page_url: &Url) -> Interstitial {
    static EXPORT_HREF: OnceLock<Regex> = OnceLock::new();
    static FORM_ACTION: OnceLock<Regex> = OnceLock::new();
    static HIDDEN_INPUT: OnceLock<Regex> = OnceLock::new();
    static DOWNLOAD_URL: OnceLock<Regex> = OnceLock::new();
    static ERROR_CAPTION: OnceLock<Regex> = OnceLock::new();

    let export_href = cached(&EXPORT_HREF, r#"href="(/uc\?export=download[^"]+)""#);
    if let Some(path) = export_href.captures(page).map(|c| html_unescape(&c[1])) {
        if let Ok(url) = page_url.join(&path) {
            return Interstitial::Follow(url);
        }
    }

    let form_action = cached(&FORM_ACTION, r#"<form[^>]*id="download-form"[^>]*action="([^"]+)""#);
    if let Some(action) = form_action.captures(page).map(|c| html_unescape(&c[1])) {
        if let Ok(mut url) = page_url.join(&action) {
            let hidden = cached(
                &HIDDEN_INPUT,
                r#"<input[^>]*type="hidden"[^>]*name="([^"]+)"[^>]*value="([^"]*)""#,
            );
            {
                let mut query = url.query_pairs_mut();
                for c in hidden.captures_iter(page) {
                    query.append_pair(&html_unescape(&c[1]), &html_unescape(&c[2]));
                }
            }
            return Interstitial::Follow(url);
        }
    }

    let download_url = cached(&DOWNLOAD_URL, r#""downloadUrl":"([^"]+)""#);
    if let Some(raw) = download_url.captures(page).map(|c| c[1].to_string()) {
        // The value is a JS string literal (=, &, \/).
        let decoded = serde_json::from_str::<String>(&format!("\"{raw}\"")).unwrap_or(raw);
        if let Ok(url) = page_url.join(&decoded) {
            return Interstitial::Follow(url);
        }
    }

    let error_caption = cached(&ERROR_CAPTION, r#"(?s)<p class="uc-error-subcaption">(.*?)</p>"#);
    if let Some(caption) = error_caption.captures(page) {
        return Interstitial::Rejected(html_unescape(caption[1].trim()));
    }

    Interstitial::Rejected(NO_PUBLIC_LINK.to_string())
}

pub(crate) fn with_confirm_token(url: &Url, token: &str) -> Url {
    let mut confirmed = url.clone();
    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| k != "confirm")
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    confirmed
        .query_pairs_mut()
        .clear()
        .extend_pairs(kept)
        .append_pair("confirm", token);
    confirmed
}

fn html_unescape(s: &str) -> String {
    s.replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&#x27;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}

/// File name advertised by a `Content-Disposition` header, reduced to its last
/// path component. `filename*` (RFC 5987) wins over `filename`.
pub fn content_disposition_filename(header: &str) -> Option<String> {
    let mut plain = None;
    let mut extended = None;
    for param in header.split(';').map(str::trim) {
        let Some((key, value)) = param.split_once('=') else {
            continue;
        };
        match key.trim().to_ascii_lowercase().as_str() {
            "filename*" => {
                let value = value.trim().trim_matches('"');
                let encoded = value.rsplit_once('\'').map(|(_, v)| v).unwrap_or(value);
                extended = urlencoding::decode(encoded).ok().map(|v| v.into_owned());
            }
            "filename" => plain = Some(value.trim().trim_matches('"').to_string()),
            _ => {}
        }
    }
    file_name_component(&extended.or(plain)?)
}
