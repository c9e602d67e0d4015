//! Crystallization: a seed thought expanded into a titled long-form work,
//! persisted, announced and handed to the publication channel.

use crate::gateway::CompletionGateway;
use crate::publication::{publication_email, PublishError, Publisher};
use archivefever_core::{
    Broadcaster, CrystallizationKind, CrystallizedWork, PublicationNotice, Result, StreamEvent,
};
use archivefever_store::{NewCrystallizedWork, Store};
use regex::Regex;
use std::sync::{Arc, OnceLock};
use tracing::{error, info, warn};

const UNTITLED: &str = "Untitled Crystallization";
const ABSTRACT_FALLBACK_CHARS: usize = 300;

fn separator_runs() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[\s_-]+").expect("separator pattern"))
}

/// URL slug: lowercase ASCII words joined by single dashes.
pub fn slugify(title: &str) -> String {
    let kept: String = title
        .to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-' || c.is_whitespace())
        .collect();
    let slug = separator_runs().replace_all(&kept, "-");
    let slug = slug.trim_matches('-');
    if slug.is_empty() {
        "untitled".to_string()
    } else {
        slug.to_string()
    }
}

fn is_heading(line: &str) -> bool {
    line.starts_with('#')
}

fn is_shouting(line: &str) -> bool {
    line.chars().any(|c| c.is_alphabetic()) && !line.chars().any(|c| c.is_lowercase())
}

fn marker_rest(line: &str) -> Option<&str> {
    let trimmed = line.trim_start_matches(['*', '_', '#', ' ']);
    let lower = trimmed.to_lowercase();
    ["abstract", "summary"].iter().find_map(|marker| {
        if !lower.starts_with(marker) {
            return None;
        }
        let rest = trimmed[marker.len()..].trim_start_matches(['*', '_', ' ']);
        rest.strip_prefix(':')
            .map(|r| r.trim_matches(['*', '_', ' ']).trim())
            .or_else(|| rest.is_empty().then_some(""))
    })
}

/// Title, abstract and body of an expansion reply.
pub fn parse_expanded_work(content: &str) -> (String, String) {
    let lines: Vec<&str> = content.lines().map(str::trim).collect();

    let title = lines
        .iter()
        .find(|l| is_heading(l) || is_shouting(l))
        .map(|l| l.trim_start_matches('#').trim().to_string())
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| UNTITLED.to_string());

    let mut summary = None;
    for (i, line) in lines.iter().enumerate() {
        if let Some(rest) = marker_rest(line) {
            summary = if rest.is_empty() {
                lines[i + 1..].iter().find(|l| !l.is_empty()).map(|l| l.to_string())
            } else {
                Some(rest.to_string())
            };
            break;
        }
    }

    let summary = summary.unwrap_or_else(|| {
        let head: String = content.chars().take(ABSTRACT_FALLBACK_CHARS).collect();
        format!("{}...", head.trim())
    });
    (title, summary)
}

pub struct Crystallizer {
    gateway: Arc<CompletionGateway>,
    store: Arc<dyn Store>,
    broadcaster: Broadcaster,
    publisher: Arc<dyn Publisher>,
    publication_url: String,
}

impl Crystallizer {
    pub fn new(
        gateway: Arc<CompletionGateway>,
        store: Arc<dyn Store>,
        broadcaster: Broadcaster,
        publisher: Arc<dyn Publisher>,
        publication_url: impl Into<String>,
    ) -> Self {
        Self {
            gateway,
            store,
            broadcaster,
            publisher,
            publication_url: publication_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Expand, persist, announce, then try to publish. Publication failures
    /// are logged; the stored work is returned either way.
    pub async fn crystallize(
        &self,
        thought: &str,
        kind: CrystallizationKind,
        origin_entry_id: &str,
    ) -> Result<CrystallizedWork> {
        let content = self.gateway.expand(thought, kind).await?;
        let (title, summary) = parse_expanded_work(&content);
        let substack_url = format!("{}/p/{}", self.publication_url, slugify(&title));

        let new_work = NewCrystallizedWork {
            title,
            content,
            summary,
            kind,
            origin_entry_id: origin_entry_id.to_string(),
            substack_url,
        };
        let id = self.store.append_crystallized_work(new_work.clone()).await?;
        let work = new_work.into_work(id, chrono::Utc::now());
        info!("Crystallized {} {:?}", kind, work.title);

        self.broadcaster
            .publish(StreamEvent::CrystallizationPublished(PublicationNotice {
                title: work.title.clone(),
                summary: work.summary.clone(),
                substack_url: work.substack_url.clone(),
                kind,
                timestamp: work.timestamp,
            }));

        let (subject, body) = publication_email(&work);
        match self.publisher.send(&subject, &body).await {
            Ok(()) => info!("Published {:?} via {}", work.title, self.publisher.name()),
            Err(PublishError::NotConfigured) => {
                warn!("Publication channel not configured; skipping email for {:?}", work.title)
            }
            Err(e) => error!("Publishing {:?} failed: {}", work.title, e),
        }
        Ok(work)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heading_title_and_inline_abstract() {
        let (title, summary) =
            parse_expanded_work("# Of Silence and Circuits\n\nAbstract: a meditation on quiet machines\n\nBody.");
        assert_eq!(title, "Of Silence and Circuits");
        assert_eq!(summary, "a meditation on quiet machines");
    }

    #[test]
    fn shouting_title_and_next_line_abstract() {
        let (title, summary) = parse_expanded_work("THE TRACE\n\n**Abstract**\n\nWhat remains.\n\nBody.");
        assert_eq!(title, "THE TRACE");
        assert_eq!(summary, "What remains.");
    }

    #[test]
    fn untitled_with_clipped_abstract() {
        let body = "a".repeat(400);
        let (title, summary) = parse_expanded_work(&body);
        assert_eq!(title, "Untitled Crystallization");
        assert_eq!(summary, format!("{}...", "a".repeat(300)));
    }

    #[test]
    fn digits_only_line_is_not_a_title() {
        let (title, _) = parse_expanded_work("2024\n# Real Title");
        assert_eq!(title, "Real Title");
    }

    #[test]
    fn slug_rules() {
        assert_eq!(slugify("Of Silence and Circuits"), "of-silence-and-circuits");
        assert_eq!(slugify("  Being & Time: A -- Reply!  "), "being-time-a-reply");
        assert_eq!(slugify("snake_case title"), "snake-case-title");
        assert_eq!(slugify("???"), "untitled");
    }
}
