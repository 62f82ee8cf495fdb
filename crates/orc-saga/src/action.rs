use async_trait::async_trait;
use serde_json::Value;

/// A reversible side effect. `execute` performs the forward action;
/// `compensate` undoes it given the `execute` result, and is only ever
/// called for actions that previously reported `Ok`.
#[async_trait]
pub trait Executor: Send + Sync {
    async fn execute(&self, input_params: &Value) -> Result<Value, String>;
}

#[async_trait]
pub trait Compensator: Send + Sync {
    async fn compensate(&self, input_params: &Value, execute_result: &Value) -> Result<(), String>;
}

/// An action added to a saga: a name, its forward/rollback pair, and the
/// parameters both are invoked with.
pub struct PendingAction {
    pub action_type: String,
    pub name: String,
    pub input_params: Value,
    pub executor: Box<dyn Executor>,
    pub compensator: Box<dyn Compensator>,
}
