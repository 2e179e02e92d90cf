use super::html::normalize_spaces;

/// Labels that open and close sections on an NCES `cipdetail` page.
///
/// Passed into the parser explicitly so alternate page layouts can be
/// handled without touching parser code.
#[derive(Debug, Clone)]
pub struct SectionLabels {
    pub title: String,
    pub definition: String,
    pub action: String,
    pub examples: String,
    /// Navigation markers that end whatever section precedes them.
    pub stop: Vec<String>,
    /// Lines inside the examples window that are chrome, not examples.
    pub examples_chrome: Vec<String>,
    pub none_available: String,
    /// Characters scanned after the examples heading.
    pub examples_window: usize,
}

impl Default for SectionLabels {
    fn default() -> Self {
        SectionLabels {
            title: "Title:".into(),
            definition: "Definition:".into(),
            action: "Action:".into(),
            examples: "Illustrative Examples".into(),
            stop: vec!["Crosswalk".into(), "Browse".into(), "Print".into()],
            examples_chrome: vec!["Illustrative Examples".into(), "Help".into()],
            none_available: "None available".into(),
            examples_window: 3000,
        }
    }
}

impl SectionLabels {
    fn markers(&self) -> impl Iterator<Item = &str> {
        [&self.title, &self.definition, &self.action, &self.examples]
            .into_iter()
            .chain(self.stop.iter())
            .map(String::as_str)
    }
}

/// Text after `label` up to the nearest following marker, whitespace collapsed.
/// Empty when the label is absent.
pub fn section_text(page_text: &str, label: &str, labels: &SectionLabels) -> String {
    let Some(pos) = page_text.find(label) else {
        return String::new();
    };
    let start = pos + label.len();

    let end = labels
        .markers()
        .filter(|m| *m != label)
        .filter_map(|m| page_text[start..].find(m).map(|p| start + p))
        .min()
        .unwrap_or(page_text.len());

    normalize_spaces(&page_text[start..end])
}

/// Example lines under the "Illustrative Examples" heading, stopping at the
/// first navigation marker. "None available" yields nothing.
pub fn illustrative_examples(page_text: &str, labels: &SectionLabels) -> Vec<String> {
    let Some(pos) = page_text.find(labels.examples.as_str()) else {
        return Vec::new();
    };
    let window: String = page_text[pos..].chars().take(labels.examples_window).collect();

    let mut cleaned = Vec::new();
    for line in window.lines().map(normalize_spaces).filter(|l| !l.is_empty()) {
        if labels.examples_chrome.iter().any(|c| *c == line) {
            continue;
        }
        if labels.stop.iter().any(|s| line.starts_with(s.as_str())) {
            break;
        }
        cleaned.push(line);
    }

    if cleaned.iter().any(|l| l.contains(labels.none_available.as_str())) {
        return Vec::new();
    }

    cleaned.retain(|l| l.chars().count() > 2);
    cleaned
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = "Detail for CIP Code 14.0903\nTitle:\nSoftware Engineering.\n\
        Definition:\nA program that prepares individuals to apply scientific\nand mathematical principles.\n\
        Action:\nNew\nIllustrative Examples\nHelp\nSoftware Architecture\nSoftware Quality Assurance\n\
        Crosswalk\nBrowse\nPrint";

    #[test]
    fn sections_bounded_by_next_label() {
        let l = SectionLabels::default();
        assert_eq!(section_text(PAGE, "Title:", &l), "Software Engineering.");
        assert_eq!(
            section_text(PAGE, "Definition:", &l),
            "A program that prepares individuals to apply scientific and mathematical principles."
        );
        assert_eq!(section_text(PAGE, "Action:", &l), "New");
    }

    #[test]
    fn absent_label_is_empty() {
        let l = SectionLabels::default();
        assert_eq!(section_text("Title:\nX", "Definition:", &l), "");
    }

    #[test]
    fn last_section_runs_to_end() {
        let l = SectionLabels::default();
        assert_eq!(section_text("Title:\nAgriculture, General.", "Title:", &l), "Agriculture, General.");
    }

    #[test]
    fn examples_listed_until_nav() {
        let l = SectionLabels::default();
        assert_eq!(
            illustrative_examples(PAGE, &l),
            vec!["Software Architecture", "Software Quality Assurance"]
        );
    }

    #[test]
    fn none_available_means_empty() {
        let l = SectionLabels::default();
        let page = "Illustrative Examples\nNone available.\nBrowse";
        assert!(illustrative_examples(page, &l).is_empty());
        assert!(illustrative_examples("Title:\nX", &l).is_empty());
    }

    #[test]
    fn custom_labels() {
        let l = SectionLabels {
            title: "Titre:".into(),
            ..SectionLabels::default()
        };
        assert_eq!(section_text("Titre:\nGénie\nDefinition:\nx", "Titre:", &l), "Génie");
    }
}
