use crate::value::Value;

/// The tri-state result of executing a statement or a block of statements.
///
/// Not a [`Value`]; never stored in a [`crate::Scope`]. Block and list executors
/// propagate `Break`/`Return` upward unchanged until an enclosing loop, switch, or
/// function body absorbs it.
#[derive(Debug, Clone)]
pub enum Signal {
    /// Fell off the end of the statement/block normally.
    Default,
    /// A `Break` statement ran; absorbed by the innermost loop or switch.
    Break,
    /// A `Return` statement ran; absorbed by the innermost function call.
    Return(Option<Value>),
}

impl Signal {
    #[must_use]
    pub fn is_default(&self) -> bool {
        matches!(self, Self::Default)
    }
}
