// Result rendering for the terminal and as an embeddable HTML snippet

use serde::Serialize;

use crate::jobs::JobOutput;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultKind {
    Image,
    Video,
    Audio,
    Link,
}

impl ResultKind {
    /// Guess the media type from the URL path when the task doesn't say.
    pub fn from_url(url: &str) -> Self {
        let path = url.split(['?', '#']).next().unwrap_or(url).to_lowercase();
        let ext = path.rsplit_once('.').map(|(_, ext)| ext).unwrap_or("");
        match ext {
            "png" | "jpg" | "jpeg" | "webp" | "gif" => ResultKind::Image,
            "mp4" | "webm" | "mov" => ResultKind::Video,
            "wav" | "mp3" | "ogg" | "flac" => ResultKind::Audio,
            _ => ResultKind::Link,
        }
    }

    fn noun(&self) -> &'static str {
        match self {
            ResultKind::Image => "image",
            ResultKind::Video => "video",
            ResultKind::Audio => "audio",
            ResultKind::Link => "output",
        }
    }
}

/// Escape a value for use inside a double quoted HTML attribute
fn escape_attr(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '"' => escaped.push_str("&quot;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

pub struct ResultRenderer {
    kind: Option<ResultKind>,
}

impl ResultRenderer {
    pub fn new(kind: ResultKind) -> Self {
        Self { kind: Some(kind) }
    }

    /// Renderer that picks the media type from each URL
    pub fn by_url() -> Self {
        Self { kind: None }
    }

    fn kind_for(&self, url: &str) -> ResultKind {
        self.kind.unwrap_or_else(|| ResultKind::from_url(url))
    }

    pub fn render_text(&self, output: &JobOutput) -> String {
        match output.url() {
            Some(url) => format!(
                "Processing completed. Output {}: {}",
                self.kind_for(url).noun(),
                url
            ),
            None => format!("Processing completed. Output: {}", describe(output)),
        }
    }

    pub fn render_html(&self, output: &JobOutput) -> String {
        let Some(url) = output.url() else {
            return format!("<p>Processing completed. {}</p>", escape_attr(&describe(output)));
        };
        let src = escape_attr(url);
        let link = format!(
            "<a href=\"{}\" target=\"_blank\">Click here</a> to view the output {}.",
            src,
            self.kind_for(url).noun()
        );

        match self.kind_for(url) {
            ResultKind::Image => format!(
                "<p>Processing completed. {}</p>\n<img src=\"{}\" alt=\"Generated image\">",
                link, src
            ),
            ResultKind::Video => format!(
                "<p>Processing completed. {}</p>\n<video controls src=\"{}\"></video>",
                link, src
            ),
            ResultKind::Audio => format!(
                "<p>Processing completed. {}</p>\n<audio controls src=\"{}\"></audio>\n<a href=\"{}\" download>Download</a>",
                link, src, src
            ),
            ResultKind::Link => format!("<p>Processing completed. {}</p>", link),
        }
    }
}

fn describe(output: &JobOutput) -> String {
    match output {
        JobOutput::Url(url) => url.clone(),
        JobOutput::Object(object) => {
            serde_json::to_string(&object.extra).unwrap_or_else(|_| "{}".to_string())
        }
    }
}
