use std::sync::Arc;

use crate::engine::AnswerEngine;

#[derive(Clone)]
pub struct HandlerState {
    pub engine: Arc<AnswerEngine>,
}

impl HandlerState {
    pub fn new(engine: Arc<AnswerEngine>) -> Self {
        Self { engine }
    }
}
