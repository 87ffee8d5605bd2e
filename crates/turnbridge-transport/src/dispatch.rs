//! Command dispatch: turns inbound commands into keystroke injections.

use std::sync::Arc;

use tokio::sync::watch;
use turnbridge_core::{KeystrokeInjector, Turn};

use crate::protocol::{Inbound, InboundCommand, OutboundMessage};
use crate::selector::parse_selector;

/// Latest sealed turn that offered a menu, published by the parser side.
pub type MenuReceiver = watch::Receiver<Option<Turn>>;

/// Interprets inbound commands and drives the injector.
pub struct CommandDispatcher {
    injector: Arc<dyn KeystrokeInjector>,
    last_menu: MenuReceiver,
}

impl CommandDispatcher {
    /// Create a dispatcher.
    #[must_use]
    pub fn new(injector: Arc<dyn KeystrokeInjector>, last_menu: MenuReceiver) -> Self {
        Self {
            injector,
            last_menu,
        }
    }

    /// Handle a decoded frame. Returns the reply to send, if any.
    pub async fn handle(&self, inbound: Inbound) -> Option<OutboundMessage> {
        match inbound {
            Inbound::Command(command) => self.dispatch(command).await,
            Inbound::EmptyQuery => {
                tracing::warn!("Query message without any text, ignoring");
                None
            }
            Inbound::Ignored(kind) => {
                tracing::debug!(kind = %kind, "Ignoring message type");
                None
            }
        }
    }

    /// Execute one command. Returns the reply to send, if any.
    pub async fn dispatch(&self, command: InboundCommand) -> Option<OutboundMessage> {
        match command {
            InboundCommand::Query(text) => {
                tracing::info!(chars = text.chars().count(), "Received query");
                if let Err(e) = self.injector.submit_text(&text).await {
                    tracing::error!(error = %e, "Failed to inject query");
                }
                None
            }
            InboundCommand::Action(selector) => self.select(&selector).await,
        }
    }

    async fn select(&self, selector: &str) -> Option<OutboundMessage> {
        let index = match parse_selector(selector) {
            Ok(index) => index,
            Err(e) => {
                tracing::warn!(error = %e, "Invalid action selector");
                return Some(self.retry_prompt(selector));
            }
        };

        match self.injector.select_option(index).await {
            Ok(()) => Some(OutboundMessage::Confirmation(format!(
                "Selected option {index}"
            ))),
            Err(e) => {
                tracing::error!(index, error = %e, "Failed to inject selection");
                None
            }
        }
    }

    /// Repeat the last menu, or report a plain error when there is none.
    fn retry_prompt(&self, selector: &str) -> OutboundMessage {
        let menu = self
            .last_menu
            .borrow()
            .as_ref()
            .filter(|turn| turn.has_options())
            .map(|turn| turn.options.clone());

        match menu {
            Some(options) => OutboundMessage::Response(Turn {
                text: format!(
                    "\"{selector}\" is not a valid option. Please choose one of the options below."
                ),
                options,
            }),
            None => OutboundMessage::Error(format!(
                "Invalid action \"{selector}\": expected an option number"
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Call, RecordingInjector};

    fn dispatcher(
        injector: Arc<RecordingInjector>,
        menu: Option<Turn>,
    ) -> (CommandDispatcher, watch::Sender<Option<Turn>>) {
        let (tx, rx) = watch::channel(menu);
        (CommandDispatcher::new(injector, rx), tx)
    }

    #[tokio::test]
    async fn test_query_submits_text() {
        let injector = Arc::new(RecordingInjector::default());
        let (dispatcher, _tx) = dispatcher(Arc::clone(&injector), None);

        let reply = dispatcher
            .dispatch(InboundCommand::Query("list files".into()))
            .await;
        assert!(reply.is_none());
        assert_eq!(injector.calls(), vec![Call::Submit("list files".into())]);
    }

    #[tokio::test]
    async fn test_empty_query_is_noop() {
        let injector = Arc::new(RecordingInjector::default());
        let (dispatcher, _tx) = dispatcher(Arc::clone(&injector), None);

        assert!(dispatcher.handle(Inbound::EmptyQuery).await.is_none());
        assert!(injector.calls().is_empty());
    }

    #[tokio::test]
    async fn test_spelled_and_numeric_select_the_same() {
        let injector = Arc::new(RecordingInjector::default());
        let (dispatcher, _tx) = dispatcher(Arc::clone(&injector), None);

        let spelled = dispatcher
            .dispatch(InboundCommand::Action("three".into()))
            .await;
        let numeric = dispatcher.dispatch(InboundCommand::Action("3".into())).await;
        assert_eq!(spelled, numeric);
        assert_eq!(
            spelled,
            Some(OutboundMessage::Confirmation("Selected option 3".into()))
        );
        assert_eq!(injector.calls(), vec![Call::Select(3), Call::Select(3)]);
    }

    #[tokio::test]
    async fn test_invalid_selector_repeats_last_menu() {
        let injector = Arc::new(RecordingInjector::default());
        let (dispatcher, _tx) =
            dispatcher(Arc::clone(&injector), Some(Turn::with_options("Pick?", ["X", "Y"])));

        let reply = dispatcher
            .dispatch(InboundCommand::Action("banana".into()))
            .await;
        let Some(OutboundMessage::Response(turn)) = reply.clone() else {
            panic!("expected a retry response, got {reply:?}");
        };
        assert_eq!(turn.options, vec!["X", "Y"]);
        assert!(turn.text.contains("banana"));
        assert!(injector.calls().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_selector_without_menu_is_error() {
        let injector = Arc::new(RecordingInjector::default());
        let (dispatcher, _tx) = dispatcher(Arc::clone(&injector), None);

        let reply = dispatcher
            .dispatch(InboundCommand::Action("banana".into()))
            .await;
        assert!(matches!(reply, Some(OutboundMessage::Error(_))));
    }

    #[tokio::test]
    async fn test_menu_updates_are_seen() {
        let injector = Arc::new(RecordingInjector::default());
        let (dispatcher, tx) = dispatcher(Arc::clone(&injector), None);

        tx.send_replace(Some(Turn::with_options("Again?", ["Yes", "No"])));
        let reply = dispatcher.dispatch(InboundCommand::Action("maybe".into())).await;
        assert!(matches!(reply, Some(OutboundMessage::Response(t)) if t.options == ["Yes", "No"]));
    }

    #[tokio::test]
    async fn test_injector_failure_sends_nothing() {
        let injector = Arc::new(RecordingInjector::failing());
        let (dispatcher, _tx) = dispatcher(Arc::clone(&injector), None);

        let reply = dispatcher.dispatch(InboundCommand::Action("2".into())).await;
        assert!(reply.is_none());
        assert_eq!(injector.calls(), vec![Call::Select(2)]);
    }
}
