use regex::Regex;

/// Input longer than this is rejected outright before any pattern scan.
const MAX_INPUT_CHARS: usize = 4_000;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InputType {
    General,
    Email,
    EventName,
}

/// Outcome of one validation pass. Never partially valid.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValidationResult {
    pub valid: bool,
    pub reason: Option<String>,
}

impl ValidationResult {
    pub fn ok() -> Self {
        Self { valid: true, reason: None }
    }

    pub fn rejected(reason: impl Into<String>) -> Self {
        Self { valid: false, reason: Some(reason.into()) }
    }
}

/// Pattern-based gate in front of the booking agent. Compiles its patterns
/// once at construction; the same instance is shared across requests.
#[derive(Clone, Debug)]
pub struct InputValidator {
    markup_injection: Regex,
    sql_injection: Regex,
    script_scheme: Regex,
    email: Regex,
}

impl InputValidator {
    pub fn new() -> Self {
        // The patterns are intentionally coarse: anything matching is hostile
        // enough that a false positive costs one clarification reply.
        let markup_injection = Regex::new(
            r"(?i)<\s*/?\s*(script|iframe|object|embed|svg|img)\b|\bon(load|error|click|focus|mouseover)\s*=",
        )
        .expect("markup injection pattern is valid");
        let sql_injection = Regex::new(
            r"(?i)'\s*(or|and)\s+\S+\s*=|\bunion\b\s+(all\s+)?select\b|\bdrop\s+(table|database)\b|\binsert\s+into\b|\bdelete\s+from\b|\bexec(ute)?\s*\(|;\s*--",
        )
        .expect("sql injection pattern is valid");
        let script_scheme =
            Regex::new(r"(?i)\b(javascript|vbscript|data)\s*:").expect("scheme pattern is valid");
        let email = Regex::new(r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9-]+(\.[A-Za-z0-9-]+)*\.[A-Za-z]{2,}$")
            .expect("email pattern is valid");

        Self { markup_injection, sql_injection, script_scheme, email }
    }

    pub fn validate_input(&self, text: &str, input_type: InputType) -> ValidationResult {
        if text.chars().count() > MAX_INPUT_CHARS {
            return ValidationResult::rejected("input exceeds maximum length");
        }
        if self.markup_injection.is_match(text) {
            return ValidationResult::rejected("markup or script injection pattern");
        }
        if self.sql_injection.is_match(text) {
            return ValidationResult::rejected("sql injection pattern");
        }
        if self.script_scheme.is_match(text) {
            return ValidationResult::rejected("executable uri scheme");
        }
        if input_type == InputType::Email && !self.email.is_match(text.trim()) {
            return ValidationResult::rejected("syntactically invalid email address");
        }

        ValidationResult::ok()
    }

    /// The agent must never emit a blank reply.
    pub fn validate_ai_response(&self, text: &str) -> ValidationResult {
        if text.trim().is_empty() {
            return ValidationResult::rejected("blank assistant reply");
        }
        ValidationResult::ok()
    }

    pub fn is_valid_email(&self, text: &str) -> bool {
        self.email.is_match(text.trim())
    }
}

impl Default for InputValidator {
    fn default() -> Self {
        Self::new()
    }
}
