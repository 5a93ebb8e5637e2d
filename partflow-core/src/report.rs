// SPDX-License-Identifier: GPL-3.0-only

//! Hierarchical execution log.
//!
//! Every operation opens a child report per job, and jobs append status
//! lines for each sub-command they run, so a failure is attributable to the
//! operation, the job, and the specific command that produced it.

/// One node of the report tree.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Report {
    heading: String,
    lines: Vec<String>,
    children: Vec<Report>,
}

impl Report {
    /// Root report for one commit run.
    pub fn new_root() -> Self {
        Self::default()
    }

    pub fn with_heading(heading: impl Into<String>) -> Self {
        Self {
            heading: heading.into(),
            ..Self::default()
        }
    }

    pub fn heading(&self) -> &str {
        &self.heading
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn children(&self) -> &[Report] {
        &self.children
    }

    /// Append a status line to this scope.
    pub fn line(&mut self, text: impl Into<String>) {
        self.lines.push(text.into());
    }

    /// Open a nested scope and return it for writing.
    pub fn add_child(&mut self, heading: impl Into<String>) -> &mut Report {
        self.children.push(Report::with_heading(heading));
        self.children.last_mut().expect("just pushed")
    }

    /// Render the tree as indented text, two spaces per level.
    pub fn render(&self) -> String {
        let mut out = String::new();
        self.render_into(&mut out, 0);
        out
    }

    fn render_into(&self, out: &mut String, depth: usize) {
        let pad = "  ".repeat(depth);
        if !self.heading.is_empty() {
            out.push_str(&pad);
            out.push_str(&self.heading);
            out.push('\n');
        }
        for line in &self.lines {
            out.push_str(&pad);
            out.push_str("  ");
            out.push_str(line);
            out.push('\n');
        }
        for child in &self.children {
            child.render_into(out, depth + 1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_scopes_render_indented() {
        let mut root = Report::new_root();
        let op = root.add_child("Delete partition /dev/sda3");
        let job = op.add_child("Delete file system on /dev/sda3");
        job.line("wipefs exited with code 0");

        let rendered = root.render();
        assert!(rendered.contains("Delete partition /dev/sda3\n"));
        assert!(rendered.contains("    Delete file system on /dev/sda3\n"));
        assert!(rendered.contains("      wipefs exited with code 0\n"));
    }
}
