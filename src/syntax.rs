//! Static validation of generated code candidates.
//!
//! The checker answers one question, whether a code unit looks parseable,
//! without ever executing it. Generation wraps code in markdown fences more
//! often than not, so fence markers are stripped first; they are a formatting
//! artifact, not part of the code.
//!
//! The check is a conservative structural scan (string termination, bracket
//! pairing, block/indent shape), not a full grammar. A candidate that slips
//! through still fails safely in the sandbox as a syntax-kind outcome; a
//! candidate rejected here is never executed.

use regex::Regex;
use std::sync::LazyLock;

static FENCE_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*```[A-Za-z0-9_+-]*\s*$").expect("fence regex is valid"));

/// Remove markdown fence marker lines (```` ```python ````, ```` ``` ````)
/// from a generated code block. The code between the markers is preserved.
pub fn strip_code_fences(code: &str) -> String {
    code.lines()
        .filter(|line| !FENCE_LINE.is_match(line))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Pure static syntax checker for generated Python code units.
#[derive(Debug, Clone, Default)]
pub struct SyntaxChecker;

/// Per-line scan result fed into the block-shape pass.
struct LineShape {
    indent: usize,
    blank: bool,
    opens_block: bool,
    /// Bracket depth carried past the end of the line
    depth_after: usize,
}

impl SyntaxChecker {
    pub fn new() -> Self {
        Self
    }

    /// Check whether a code unit is structurally valid. Fenced-block markers
    /// are stripped before checking; the input is never mutated or executed.
    pub fn is_valid(&self, code: &str) -> bool {
        let code = strip_code_fences(code);

        // Stray fence fragments that survived stripping (e.g. an unpaired
        // inline marker) are generation garbage, not code.
        if code.contains("```") {
            return false;
        }

        let Some(shapes) = self.scan(&code) else {
            return false;
        };
        self.check_block_shape(&shapes)
    }

    /// Character-level scan: strings, comments, bracket pairing.
    /// Returns `None` on a structural error.
    fn scan(&self, code: &str) -> Option<Vec<LineShape>> {
        let mut stack: Vec<char> = Vec::new();
        let mut shapes = Vec::new();
        // (quote char, is_triple)
        let mut in_string: Option<(char, bool)> = None;

        for line in code.lines() {
            let chars: Vec<char> = line.chars().collect();
            let mut i = 0;
            let mut last_code_char: Option<char> = None;
            let indent = chars.iter().take_while(|c| **c == ' ').count();

            while i < chars.len() {
                let c = chars[i];

                if let Some((quote, triple)) = in_string {
                    if c == '\\' {
                        i += 2;
                        continue;
                    }
                    if c == quote {
                        if triple {
                            if chars.get(i + 1) == Some(&quote) && chars.get(i + 2) == Some(&quote)
                            {
                                in_string = None;
                                i += 3;
                                last_code_char = Some(quote);
                                continue;
                            }
                        } else {
                            in_string = None;
                            last_code_char = Some(quote);
                        }
                    }
                    i += 1;
                    continue;
                }

                match c {
                    '#' => break,
                    '\'' | '"' => {
                        let triple =
                            chars.get(i + 1) == Some(&c) && chars.get(i + 2) == Some(&c);
                        in_string = Some((c, triple));
                        if triple {
                            i += 3;
                            continue;
                        }
                    }
                    '(' | '[' | '{' => stack.push(c),
                    ')' | ']' | '}' => {
                        let open = stack.pop()?;
                        let matches = matches!(
                            (open, c),
                            ('(', ')') | ('[', ']') | ('{', '}')
                        );
                        if !matches {
                            return None;
                        }
                    }
                    _ => {}
                }

                if !c.is_whitespace() {
                    last_code_char = Some(c);
                }
                i += 1;
            }

            // Single-quoted string left open at end of line (no implicit
            // continuation in this subset).
            if matches!(in_string, Some((_, false))) {
                return None;
            }

            shapes.push(LineShape {
                indent,
                blank: last_code_char.is_none() && in_string.is_none(),
                opens_block: stack.is_empty() && last_code_char == Some(':'),
                depth_after: stack.len(),
            });
        }

        // Unterminated triple-quoted string or unclosed bracket at EOF.
        if in_string.is_some() || !stack.is_empty() {
            return None;
        }

        Some(shapes)
    }

    /// A block-introducing line (ends with `:` outside brackets) must be
    /// followed by a more-indented statement.
    fn check_block_shape(&self, shapes: &[LineShape]) -> bool {
        for (idx, shape) in shapes.iter().enumerate() {
            if !shape.opens_block {
                continue;
            }
            let body = shapes
                .iter()
                .skip(idx + 1)
                .find(|s| !s.blank && s.depth_after == 0);
            match body {
                Some(next) if next.indent > shape.indent => {}
                _ => return false,
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_valid_plain_code() {
        let checker = SyntaxChecker::new();
        assert!(checker.is_valid("import pandas as pd\nresult = pd.read_csv(files[0]).mean()"));
    }

    #[test]
    fn test_valid_block_structure() {
        let checker = SyntaxChecker::new();
        let code = "def mean(xs):\n    total = sum(xs)\n    return total / len(xs)\n\nresult = mean([1, 2, 3])";
        assert!(checker.is_valid(code));
    }

    #[test]
    fn test_strips_fences_before_checking() {
        let checker = SyntaxChecker::new();
        let code = "```python\nresult = 1 + 1\n```";
        assert!(checker.is_valid(code));
        assert_eq!(strip_code_fences(code), "result = 1 + 1");
    }

    #[test]
    fn test_unbalanced_brackets_rejected() {
        let checker = SyntaxChecker::new();
        assert!(!checker.is_valid("result = (1 + 2"));
        assert!(!checker.is_valid("result = [1, 2)"));
        assert!(!checker.is_valid("result = 1 + 2)"));
    }

    #[test]
    fn test_unterminated_string_rejected() {
        let checker = SyntaxChecker::new();
        assert!(!checker.is_valid("result = 'unterminated"));
        assert!(!checker.is_valid("result = \"\"\"still open"));
    }

    #[test]
    fn test_empty_block_rejected() {
        let checker = SyntaxChecker::new();
        assert!(!checker.is_valid("def f():\nresult = 1"));
        assert!(!checker.is_valid("for x in xs:"));
    }

    #[test]
    fn test_multiline_call_spans_lines() {
        let checker = SyntaxChecker::new();
        let code = "result = sum(\n    [1, 2, 3]\n)";
        assert!(checker.is_valid(code));
    }

    #[test]
    fn test_comments_and_strings_ignore_brackets() {
        let checker = SyntaxChecker::new();
        assert!(checker.is_valid("x = 1  # not a bracket: (((\nresult = x"));
        assert!(checker.is_valid("result = '((('"));
        assert!(checker.is_valid("result = \"it's fine\""));
    }

    #[test]
    fn test_slice_colon_is_not_a_block() {
        let checker = SyntaxChecker::new();
        assert!(checker.is_valid("result = xs[1:]"));
    }

    #[test]
    fn test_stray_fence_marker_rejected() {
        let checker = SyntaxChecker::new();
        assert!(!checker.is_valid("result = 1 ``` leftover"));
    }

    #[test]
    fn test_idempotent_and_non_mutating() {
        let checker = SyntaxChecker::new();
        let code = "```python\nresult = 42\n```";
        let first = checker.is_valid(code);
        let second = checker.is_valid(code);
        assert_eq!(first, second);
        // Stripping twice yields the same text.
        assert_eq!(
            strip_code_fences(&strip_code_fences(code)),
            strip_code_fences(code)
        );
    }
}
