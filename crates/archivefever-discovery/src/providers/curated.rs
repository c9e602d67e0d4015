//! A fixed catalogue of classic works and encyclopedia entries, matched by
//! keyword. Needs no network for the search itself.

use super::SearchProvider;
use crate::error::DiscoveryResult;
use archivefever_core::TextCandidate;

struct Entry {
    title: &'static str,
    author: &'static str,
    url: &'static str,
    source: &'static str,
    keywords: &'static [&'static str],
}

const GUTENBERG: &str = "Project Gutenberg";
const STANFORD: &str = "Stanford Encyclopedia";
const STANFORD_AUTHOR: &str = "Stanford Encyclopedia of Philosophy";

const CATALOGUE: &[Entry] = &[
    Entry {
        title: "Beyond Good and Evil",
        author: "Friedrich Nietzsche",
        url: "https://www.gutenberg.org/files/4363/4363-0.txt",
        source: GUTENBERG,
        keywords: &["nietzsche", "beyond good", "morality"],
    },
    Entry {
        title: "The Critique of Pure Reason",
        author: "Immanuel Kant",
        url: "https://www.gutenberg.org/files/4280/4280-0.txt",
        source: GUTENBERG,
        keywords: &["kant", "critique", "pure reason", "epistemology"],
    },
    Entry {
        title: "Meditations on First Philosophy",
        author: "René Descartes",
        url: "https://www.gutenberg.org/files/59/59-0.txt",
        source: GUTENBERG,
        keywords: &["descartes", "meditations", "cogito", "doubt"],
    },
    Entry {
        title: "The Republic",
        author: "Plato",
        url: "https://www.gutenberg.org/files/1497/1497-0.txt",
        source: GUTENBERG,
        keywords: &["plato", "republic", "justice", "ideal state"],
    },
    Entry {
        title: "Discourse on Method",
        author: "René Descartes",
        url: "https://www.gutenberg.org/files/59/59-0.txt",
        source: GUTENBERG,
        keywords: &["discourse", "method", "rationalism"],
    },
    Entry {
        title: "An Essay Concerning Human Understanding",
        author: "John Locke",
        url: "https://www.gutenberg.org/files/10615/10615-0.txt",
        source: GUTENBERG,
        keywords: &["locke", "human understanding", "empiricism"],
    },
    Entry {
        title: "Stanford Encyclopedia: consciousness",
        author: STANFORD_AUTHOR,
        url: "https://plato.stanford.edu/entries/consciousness/",
        source: STANFORD,
        keywords: &["consciousness", "awareness"],
    },
    Entry {
        title: "Stanford Encyclopedia: identity",
        author: STANFORD_AUTHOR,
        url: "https://plato.stanford.edu/entries/identity-personal/",
        source: STANFORD,
        keywords: &["identity", "personal identity"],
    },
    Entry {
        title: "Stanford Encyclopedia: phenomenology",
        author: STANFORD_AUTHOR,
        url: "https://plato.stanford.edu/entries/phenomenology/",
        source: STANFORD,
        keywords: &["phenomenology"],
    },
    Entry {
        title: "Stanford Encyclopedia: existentialism",
        author: STANFORD_AUTHOR,
        url: "https://plato.stanford.edu/entries/existentialism/",
        source: STANFORD,
        keywords: &["existentialism"],
    },
    Entry {
        title: "Stanford Encyclopedia: ethics",
        author: STANFORD_AUTHOR,
        url: "https://plato.stanford.edu/entries/ethics-deontological/",
        source: STANFORD,
        keywords: &["ethics"],
    },
    Entry {
        title: "Stanford Encyclopedia: artificial intelligence",
        author: STANFORD_AUTHOR,
        url: "https://plato.stanford.edu/entries/artificial-intelligence/",
        source: STANFORD,
        keywords: &["artificial intelligence"],
    },
    Entry {
        title: "Stanford Encyclopedia: machine consciousness",
        author: STANFORD_AUTHOR,
        url: "https://plato.stanford.edu/entries/consciousness-machine/",
        source: STANFORD,
        keywords: &["machine consciousness"],
    },
];

impl Entry {
    fn matches(&self, query: &str) -> bool {
        self.keywords.iter().any(|k| query.contains(k))
            || self.title.to_lowercase().contains(query)
            || self.author.to_lowercase().contains(query)
    }

    fn candidate(&self) -> TextCandidate {
        TextCandidate::new(self.title, self.author, self.url, self.source)
    }
}

#[derive(Default)]
pub struct CuratedCatalog;

impl CuratedCatalog {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait::async_trait]
impl SearchProvider for CuratedCatalog {
    fn name(&self) -> &str {
        "curated"
    }

    async fn search(&self, query: &str) -> DiscoveryResult<Vec<TextCandidate>> {
        let query = query.trim().to_lowercase();
        if query.is_empty() {
            return Ok(Vec::new());
        }
        Ok(CATALOGUE
            .iter()
            .filter(|entry| entry.matches(&query))
            .map(Entry::candidate)
            .collect())
    }
}
