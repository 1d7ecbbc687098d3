//! Execution context for model evaluation

/// Context passed to models during a forward pass
pub struct Context {
    training: bool,
}

impl Context {
    /// Create a new context
    pub fn new() -> Self {
        Self { training: true }
    }

    /// Create a context already in evaluation mode
    pub fn inference() -> Self {
        Self { training: false }
    }

    /// Set training mode
    pub fn train(&mut self) {
        self.training = true;
    }

    /// Set evaluation mode
    pub fn eval(&mut self) {
        self.training = false;
    }

    /// Check if in training mode
    pub fn is_training(&self) -> bool {
        self.training
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}
