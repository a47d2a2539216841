//! SMTP reply formatting.

/// A server reply, possibly spanning several lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    code: u16,
    lines: Vec<String>,
}

impl Reply {
    /// Single-line reply.
    pub fn new(code: u16, text: impl Into<String>) -> Self {
        Self {
            code,
            lines: vec![text.into()],
        }
    }

    /// Multi-line reply, e.g. the EHLO capability list.
    pub fn multiline(code: u16, lines: Vec<String>) -> Self {
        Self { code, lines }
    }

    /// Wire form. Every line but the last uses `-` after the code.
    pub fn to_wire(&self) -> String {
        if self.lines.is_empty() {
            return format!("{}\r\n", self.code);
        }
        let last = self.lines.len() - 1;
        self.lines
            .iter()
            .enumerate()
            .map(|(i, line)| {
                let sep = if i == last { ' ' } else { '-' };
                format!("{}{}{}\r\n", self.code, sep, line)
            })
            .collect()
    }
}
