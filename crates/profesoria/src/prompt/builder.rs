//! Structured instruction builder.
//!
//! [`InstructionBuilder`] assembles the plain-text instructions sent to the
//! model: a preamble, then `HEADING:` blocks holding prose, numbered rule
//! lists or `- Label: value` context lines. Sections are joined with blank
//! lines.

/// Placeholder shown for a context field the teacher left empty.
pub const UNSPECIFIED: &str = "(sin especificar)";

/// Builder for multi-section model instructions.
///
/// # Example
///
/// ```
/// use profesoria::prompt::InstructionBuilder;
///
/// let prompt = InstructionBuilder::new("Actúa como auditor académico.")
///     .rules("REGLAS", ["Usa lenguaje técnico.", "Responde en español."])
///     .fields("CONTEXTO", [("Nivel", "Licenciatura"), ("Carrera", "")])
///     .section("SALIDA", "JSON puro.")
///     .build();
///
/// assert!(prompt.contains("REGLAS:\n1. Usa lenguaje técnico.\n2. Responde en español."));
/// assert!(prompt.contains("- Carrera: (sin especificar)"));
/// assert!(prompt.ends_with("SALIDA:\nJSON puro."));
/// ```
pub struct InstructionBuilder {
    sections: Vec<String>,
}

impl InstructionBuilder {
    /// Create a builder whose first block is `preamble`, included as-is.
    pub fn new(preamble: impl Into<String>) -> Self {
        Self {
            sections: vec![preamble.into()],
        }
    }

    /// Append a headed prose block. Skipped if `content` is empty.
    pub fn section(mut self, heading: &str, content: impl Into<String>) -> Self {
        let content = content.into();
        if !content.is_empty() {
            self.sections.push(format!("{heading}:\n{content}"));
        }
        self
    }

    /// Append a headed prose block only when `condition` holds.
    ///
    /// `content_fn` is only called when the block is included.
    pub fn section_if(
        self,
        condition: bool,
        heading: &str,
        content_fn: impl FnOnce() -> String,
    ) -> Self {
        if condition {
            self.section(heading, content_fn())
        } else {
            self
        }
    }

    /// Append a numbered rule list. Skipped if there are no rules.
    pub fn rules<I, S>(mut self, heading: &str, rules: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let lines: Vec<String> = rules
            .into_iter()
            .enumerate()
            .map(|(i, rule)| format!("{}. {}", i + 1, rule.as_ref()))
            .collect();
        if !lines.is_empty() {
            self.sections.push(format!("{heading}:\n{}", lines.join("\n")));
        }
        self
    }

    /// Append `- Label: value` lines.
    ///
    /// Values are interpolated verbatim. An empty value is rendered as
    /// [`UNSPECIFIED`] rather than dropped, so the model sees every field.
    pub fn fields<'a, I>(mut self, heading: &str, fields: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let lines: Vec<String> = fields
            .into_iter()
            .map(|(label, value)| {
                let value = if value.trim().is_empty() {
                    UNSPECIFIED
                } else {
                    value
                };
                format!("- {label}: {value}")
            })
            .collect();
        if !lines.is_empty() {
            self.sections.push(format!("{heading}:\n{}", lines.join("\n")));
        }
        self
    }

    pub fn build(self) -> String {
        self.sections.join("\n\n")
    }
}
