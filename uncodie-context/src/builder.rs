//! Sectioned context assembly under a character budget.

/// Default budget for one prompt context, in characters.
pub const DEFAULT_CONTEXT_BUDGET: usize = 24_000;

/// One titled block of a prompt context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextSection {
    pub title: String,
    pub body: String,
    /// Higher is more important.
    pub priority: i32,
    /// Whether the body may be truncated to fit the budget.
    pub compressible: bool,
}

impl ContextSection {
    fn header(&self) -> String {
        format!("## {}\n", self.title)
    }

    fn rendered_len(&self) -> usize {
        char_len(&self.header()) + char_len(&self.body) + 2
    }
}

/// Assembles sections in descending priority until the budget is spent.
#[derive(Debug, Clone)]
pub struct ContextBuilder {
    budget: usize,
    sections: Vec<ContextSection>,
}

impl Default for ContextBuilder {
    fn default() -> Self {
        Self::new(DEFAULT_CONTEXT_BUDGET)
    }
}

impl ContextBuilder {
    pub fn new(budget: usize) -> Self {
        Self {
            budget,
            sections: Vec::new(),
        }
    }

    /// Add a section that may be truncated.
    pub fn section(mut self, title: impl Into<String>, body: impl Into<String>, priority: i32) -> Self {
        self.push(title.into(), body.into(), priority, true);
        self
    }

    /// Add a section that is either included whole or dropped.
    pub fn fixed_section(
        mut self,
        title: impl Into<String>,
        body: impl Into<String>,
        priority: i32,
    ) -> Self {
        self.push(title.into(), body.into(), priority, false);
        self
    }

    fn push(&mut self, title: String, body: String, priority: i32, compressible: bool) {
        let body = body.trim().to_string();
        if body.is_empty() {
            return;
        }
        self.sections.push(ContextSection {
            title,
            body,
            priority,
            compressible,
        });
    }

    /// Sections in assembly order.
    pub fn sections(&self) -> Vec<&ContextSection> {
        let mut ordered: Vec<&ContextSection> = self.sections.iter().collect();
        ordered.sort_by(|a, b| b.priority.cmp(&a.priority));
        ordered
    }

    /// Render the context. Never longer than the budget, in characters.
    pub fn build(self) -> String {
        let mut out = String::new();
        let mut used = 0;

        for section in self.sections() {
            let remaining = self.budget.saturating_sub(used);
            if section.rendered_len() <= remaining {
                out.push_str(&section.header());
                out.push_str(&section.body);
                out.push_str("\n\n");
                used += section.rendered_len();
                continue;
            }

            let header = section.header();
            let overhead = char_len(&header) + 2;
            if !section.compressible || remaining <= overhead + MIN_TRUNCATED_BODY {
                continue;
            }

            let body = truncate_to_char_budget(&section.body, remaining - overhead);
            if body.is_empty() {
                continue;
            }
            used += overhead + char_len(&body);
            out.push_str(&header);
            out.push_str(&body);
            out.push_str("\n\n");
        }

        let trimmed_len = out.trim_end().len();
        out.truncate(trimmed_len);
        out
    }
}

/// A truncated body shorter than this is not worth including.
const MIN_TRUNCATED_BODY: usize = 40;

/// Truncate text to at most `max_chars` characters.
///
/// Prefers a sentence boundary in the latter half, then a word boundary in
/// the last fifth, then a hard cut.
pub fn truncate_to_char_budget(text: &str, max_chars: usize) -> String {
    if char_len(text) <= max_chars {
        return text.to_string();
    }
    if max_chars == 0 {
        return String::new();
    }

    let truncated = char_prefix(text, max_chars);

    let last_sentence = ['.', '?', '!', '\n']
        .into_iter()
        .filter_map(|c| truncated.rfind(c))
        .max();
    if let Some(pos) = last_sentence {
        if char_len(&truncated[..pos]) > max_chars / 2 {
            return truncated[..=pos].trim_end().to_string();
        }
    }

    if let Some(pos) = truncated.rfind(' ') {
        if char_len(&truncated[..pos]) > max_chars * 4 / 5 {
            return truncated[..pos].to_string();
        }
    }

    truncated.to_string()
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// The first `max_chars` characters of `s`.
fn char_prefix(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((end, _)) => &s[..end],
        None => s,
    }
}
