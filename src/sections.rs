use std::fs;
use std::path::Path;

use anyhow::{ensure, Context, Result};
use serde::{Deserialize, Serialize};

/// One chapter of the page, as listed in the sidebar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    pub id: String,
    pub number: String,
    pub title: String,
    #[serde(default)]
    pub short_title: String,
    #[serde(default)]
    pub full_title: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

impl Section {
    pub fn new(id: &str, number: &str, title: &str, enabled: bool) -> Self {
        Self {
            id: id.to_string(),
            number: number.to_string(),
            title: title.to_string(),
            short_title: title.to_string(),
            full_title: title.to_string(),
            enabled,
        }
    }
}

/// Sections in document order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SectionRegistry {
    sections: Vec<Section>,
}

impl SectionRegistry {
    pub fn new(sections: Vec<Section>) -> Result<Self> {
        for (i, s) in sections.iter().enumerate() {
            ensure!(!s.id.is_empty(), "section #{i} has an empty id");
            ensure!(
                sections[..i].iter().all(|prev| prev.id != s.id),
                "duplicate section id {:?}",
                s.id
            );
        }
        Ok(Self { sections })
    }

    /// Load a JSON array of sections.
    pub fn load(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let sections: Vec<Section> =
            serde_json::from_str(&json).context("failed to parse sections JSON")?;
        Self::new(sections)
    }

    /// The CV chapters; only the intro and the first chapter are live so far.
    pub fn builtin() -> Self {
        let sections = [
            ("hero", "00", "Intro", "Intro", "Introduzione", true),
            ("section01", "01", "La Prima Riga", "La Prima Riga", "La Prima Riga di Codice", true),
            ("section02", "02", "Aulab", "Aulab", "Aulab: Dove Tutto È Iniziato", false),
            ("section03", "03", "Backend", "Backend", "La Fatica del Backend", false),
            ("section04", "04", "React", "React", "React: Quando Ho Capito", false),
            ("section05", "05", "Primo Lavoro", "Lavoro", "Il Primo Lavoro: La Realtà", false),
            ("section06", "06", "L'AI", "AI", "L'AI: Non È Magia, È Tool", false),
            ("section07", "07", "Animazioni", "GSAP", "Le Animazioni: Dare Vita al Web", false),
            ("section08", "08", "Next.js", "Next.js", "Next.js: Maturità Tecnica", false),
            ("section09", "09", "Three.js", "Three.js", "Three.js: La Nuova Frontiera", false),
            ("section10", "10", "Oggi e Domani", "Futuro", "Oggi, E Domani", false),
        ]
        .into_iter()
        .map(|(id, number, title, short_title, full_title, enabled)| Section {
            id: id.to_string(),
            number: number.to_string(),
            title: title.to_string(),
            short_title: short_title.to_string(),
            full_title: full_title.to_string(),
            enabled,
        })
        .collect();
        Self { sections }
    }

    pub fn all(&self) -> &[Section] {
        &self.sections
    }

    pub fn enabled(&self) -> impl Iterator<Item = &Section> + '_ {
        self.sections.iter().filter(|s| s.enabled)
    }

    pub fn get(&self, id: &str) -> Option<&Section> {
        self.sections.iter().find(|s| s.id == id)
    }

    fn enabled_position(&self, id: &str) -> Option<usize> {
        self.enabled().position(|s| s.id == id)
    }

    /// The enabled section after `id`; `None` at the end or for an unknown id.
    pub fn next(&self, id: &str) -> Option<&Section> {
        let pos = self.enabled_position(id)?;
        self.enabled().nth(pos + 1)
    }

    /// The enabled section before `id`; `None` at the start or for an unknown id.
    pub fn previous(&self, id: &str) -> Option<&Section> {
        let pos = self.enabled_position(id)?;
        pos.checked_sub(1).and_then(|p| self.enabled().nth(p))
    }

    /// Sidebar progress for the active section, 0..=100.
    pub fn progress_percent(&self, active_id: &str) -> u32 {
        let total = self.enabled().count();
        match self.enabled_position(active_id) {
            Some(pos) if total > 1 => ((pos as f64 / (total - 1) as f64) * 100.0).round() as u32,
            _ => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> SectionRegistry {
        SectionRegistry::new(vec![
            Section::new("a", "00", "A", true),
            Section::new("b", "01", "B", false),
            Section::new("c", "02", "C", true),
            Section::new("d", "03", "D", true),
        ])
        .unwrap()
    }

    #[test]
    fn navigation_skips_disabled_sections() {
        let r = registry();
        assert_eq!(r.next("a").map(|s| s.id.as_str()), Some("c"));
        assert_eq!(r.previous("c").map(|s| s.id.as_str()), Some("a"));
        assert!(r.previous("a").is_none());
        assert!(r.next("d").is_none());
        assert!(r.next("b").is_none());
        assert!(r.next("zzz").is_none());
    }

    #[test]
    fn progress_is_position_over_last_index() {
        let r = registry();
        assert_eq!(r.progress_percent("a"), 0);
        assert_eq!(r.progress_percent("c"), 50);
        assert_eq!(r.progress_percent("d"), 100);
        assert_eq!(r.progress_percent("b"), 0);
    }

    #[test]
    fn single_section_has_no_progress() {
        let r = SectionRegistry::new(vec![Section::new("only", "00", "Only", true)]).unwrap();
        assert_eq!(r.progress_percent("only"), 0);
    }

    #[test]
    fn rejects_duplicate_ids() {
        let err = SectionRegistry::new(vec![
            Section::new("a", "00", "A", true),
            Section::new("a", "01", "A2", true),
        ])
        .unwrap_err();
        assert!(format!("{err:#}").contains("duplicate"));
    }

    #[test]
    fn builtin_enables_intro_and_first_chapter() {
        let r = SectionRegistry::builtin();
        let ids: Vec<&str> = r.enabled().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["hero", "section01"]);
        assert_eq!(r.all().len(), 11);
        assert_eq!(r.progress_percent("section01"), 100);
    }

    #[test]
    fn builtin_keeps_all_three_titles() {
        let r = SectionRegistry::builtin();
        let work = r.get("section05").unwrap();
        assert_eq!(work.title, "Primo Lavoro");
        assert_eq!(work.short_title, "Lavoro");
        assert_eq!(work.full_title, "Il Primo Lavoro: La Realtà");

        let future = r.get("section10").unwrap();
        assert_eq!(
            (future.title.as_str(), future.short_title.as_str()),
            ("Oggi e Domani", "Futuro")
        );
        assert_eq!(r.get("hero").unwrap().full_title, "Introduzione");
    }
}
