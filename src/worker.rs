use std::thread;

use crossbeam_channel::Receiver;
use log::debug;

use crate::error::MonitorError;
use crate::model::{CoreCommand, ServiceAction, WorkerCommand};
use crate::monitor::CommandSink;

/// Starts and stops services on behalf of the user.
pub trait ServiceControl: Send + 'static {
    fn control(&self, service: &str, action: ServiceAction) -> Result<(), MonitorError>;
}

/// Runs service actions off the owning thread and posts each result back.
pub fn spawn_worker<C, K>(rx: Receiver<WorkerCommand>, control: C, sink: K) -> thread::JoinHandle<()>
where
    C: ServiceControl,
    K: CommandSink,
{
    thread::spawn(move || {
        for command in rx.iter() {
            let should_continue = match command {
                WorkerCommand::Control { service, action } => {
                    debug!("Running {} for service '{}'", action, service);
                    let result = control.control(&service, action).map_err(|e| match e {
                        MonitorError::ServiceAction { message, .. } => message,
                        other => other.to_string(),
                    });
                    sink.post(CoreCommand::ActionCompleted {
                        service,
                        action,
                        result,
                    })
                }
            };
            if !should_continue {
                break;
            }
        }
    })
}
