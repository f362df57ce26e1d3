//! The built-in logging interceptor.

use crate::error::Result;
use crate::interceptor::{InterceptorStack, ServiceInterceptorFactory};
use crate::module::Module;
use crate::proxy::{MethodCall, MethodInterceptor, Proceed};
use serde_json::Value;
use std::any::Any;
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

/// Logs entry to and exit from every method of the intercepted service at
/// `debug` level. Registered as class `hive.LoggingInterceptorFactory` and
/// exposed as service `hive.LoggingInterceptor`.
#[derive(Debug, Default)]
pub struct LoggingInterceptorFactory;

impl ServiceInterceptorFactory for LoggingInterceptorFactory {
  fn create_interceptor(
    &self,
    stack: &mut dyn InterceptorStack,
    _invoking_module: &Module,
    _parameters: &[Value],
  ) -> Result<()> {
    let interceptor = LoggingInterceptor {
      service_id: stack.service_id().to_owned(),
    };
    stack.push_method_interceptor(Arc::new(interceptor));
    Ok(())
  }
}

struct LoggingInterceptor {
  service_id: String,
}

impl MethodInterceptor for LoggingInterceptor {
  fn invoke(&self, call: &MethodCall<'_>, proceed: Proceed<'_>) -> Box<dyn Any> {
    debug!(service_id = %self.service_id, method = %call, "BEGIN");
    let started = Instant::now();
    let result = proceed();
    debug!(
      service_id = %self.service_id,
      method = call.method(),
      elapsed = ?started.elapsed(),
      "END"
    );
    result
  }
}
