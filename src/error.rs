use thiserror::Error;

pub type CompileResult<T> = Result<T, CompileError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CompileError {
    #[error("{program}: invalid number of arguments")]
    Invocation { program: String },

    #[error("invalid token")]
    Lex { offset: usize },

    #[error("{message}")]
    Syntax { offset: usize, message: String },

    #[error("not an lvalue")]
    NotAnLvalue { offset: usize },

    /// The expression needs more scratch registers than the pool holds.
    #[error("internal error: register stack overflow (capacity {capacity})")]
    Capacity { offset: usize, capacity: usize },
}

impl CompileError {
    pub fn syntax(offset: usize, message: impl Into<String>) -> Self {
        CompileError::Syntax {
            offset,
            message: message.into(),
        }
    }

    pub fn offset(&self) -> Option<usize> {
        match self {
            CompileError::Invocation { .. } => None,
            CompileError::Lex { offset }
            | CompileError::Syntax { offset, .. }
            | CompileError::NotAnLvalue { offset }
            | CompileError::Capacity { offset, .. } => Some(*offset),
        }
    }

    /// Formats the error the way it is reported on stderr: the source line
    /// holding the offending byte, then a caret under it and the message.
    pub fn render(&self, src: &str) -> String {
        let Some(offset) = self.offset() else {
            return format!("{}\n", self);
        };
        let offset = offset.min(src.len());
        let line_start = src[..offset].rfind('\n').map_or(0, |i| i + 1);
        let line_end = src[offset..]
            .find('\n')
            .map_or(src.len(), |i| offset + i);
        format!(
            "{}\n{:width$}^ {}\n",
            &src[line_start..line_end],
            "",
            self,
            width = offset - line_start
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn caret_points_at_offset() {
        let err = CompileError::syntax(4, "expected ';'");
        assert_eq!(err.render("1 + 2"), "1 + 2\n    ^ expected ';'\n");
    }

    #[test]
    fn only_offending_line_is_shown() {
        let src = "{\n  x = 1 $\n}";
        let offset = src.find('$').unwrap();
        let err = CompileError::Lex { offset };
        assert_eq!(err.render(src), "  x = 1 $\n        ^ invalid token\n");
    }

    #[test]
    fn offset_past_end_points_after_last_byte() {
        let err = CompileError::syntax(10, "expected '}'");
        assert_eq!(err.render("{ 1;"), "{ 1;\n    ^ expected '}'\n");
    }

    #[test]
    fn invocation_has_no_caret() {
        let err = CompileError::Invocation {
            program: "minicc".to_string(),
        };
        assert_eq!(err.offset(), None);
        assert_eq!(err.render(""), "minicc: invalid number of arguments\n");
    }
}
