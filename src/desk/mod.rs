use std::sync::Arc;

use log::{debug, error, warn};
use tokio::runtime::Runtime;
use tokio::sync::mpsc::Receiver;
use tokio::sync::RwLock;

use crate::metrics::Metrics;
use crate::model::{Command, Journal, JournalEvent, State};

/// The desk loop: the only writer of the shared state. Commands arrive over
/// one channel and are applied strictly one at a time, so ledger mutations
/// can never interleave. Runs on the main thread until every API sender is
/// dropped.
pub fn desk(
    rt: &Runtime,
    mut rx: Receiver<Command>,
    state: Arc<RwLock<State>>,
    mut journal: Journal,
    metrics: Arc<Metrics>,
) {
    while let Some(command) = rt.block_on(rx.recv()) {
        debug!("Processing {:?}", command);
        let mut state = rt.block_on(state.write());
        apply(&mut state, command, &mut journal, &metrics);
    }
}

fn apply(state: &mut State, command: Command, journal: &mut Journal, metrics: &Metrics) {
    match command {
        Command::PlaceOrder {
            user_id,
            side,
            quantity,
            price,
            reply,
        } => {
            let result = state.place_order(user_id, side, quantity, price);
            match &result {
                Ok(placed) => {
                    metrics.order_placed();
                    record(
                        journal,
                        JournalEvent::OrderPlaced {
                            user_id: user_id.to_string(),
                            order_id: placed.order.id.0,
                            side,
                            quantity,
                            price,
                        },
                    );
                }
                Err(rejection) => {
                    metrics.order_rejected();
                    warn!("Order rejected for {}: {:?}", user_id, rejection);
                }
            }
            let _ = reply.send(result);
        }

        Command::CreateCustomer {
            username,
            email,
            reply,
        } => {
            let result = state.create_customer(&username, email).map(|account| {
                record(
                    journal,
                    JournalEvent::AccountCreated {
                        user_id: account.id.to_string(),
                        username: account.username.clone(),
                    },
                );
                crate::model::CreatedAccount {
                    id: account.id,
                    username: account.username.clone(),
                    invitation_code: None,
                }
            });
            let _ = reply.send(result);
        }

        Command::CreateSubAdmin {
            username,
            password,
            reply,
        } => {
            let result = state.create_subadmin(&username, &password).map(|account| {
                record(
                    journal,
                    JournalEvent::AccountCreated {
                        user_id: account.id.to_string(),
                        username: account.username.clone(),
                    },
                );
                crate::model::CreatedAccount {
                    id: account.id,
                    username: account.username.clone(),
                    invitation_code: account.invitation_code.clone(),
                }
            });
            let _ = reply.send(result);
        }

        Command::ResetSubAdminPassword {
            subadmin_id,
            new_password,
            reply,
        } => {
            let _ = reply.send(state.reset_subadmin_password(subadmin_id, &new_password));
        }

        Command::AssignManager {
            user_id,
            managed_by,
            reply,
        } => {
            let result = state
                .assign_manager(user_id, managed_by)
                .map(|account| account.managed_by);
            let _ = reply.send(result);
        }

        Command::Topup {
            user_id,
            asset,
            amount,
            mode,
            note,
            reply,
        } => {
            let result = state.topup(user_id, asset, amount, mode);
            if result.is_ok() {
                record(
                    journal,
                    JournalEvent::BalanceAdjusted {
                        user_id: user_id.to_string(),
                        asset,
                        amount,
                        mode,
                        note,
                    },
                );
            }
            let _ = reply.send(result);
        }

        Command::CreateFundingRequest {
            user_id,
            kind,
            asset,
            amount,
            wallet_address,
            reply,
        } => {
            let result = state
                .create_funding_request(user_id, kind, asset, amount, wallet_address)
                .map(Clone::clone);
            let _ = reply.send(result);
        }

        Command::ResolveFundingRequest {
            request_id,
            action,
            reply,
        } => {
            let result = state.resolve_funding_request(request_id, action);
            if result.is_ok() {
                metrics.funding_resolved(&format!("{:?}", action).to_uppercase());
                record(
                    journal,
                    JournalEvent::FundingResolved {
                        request_id: format!("{}", request_id.0),
                        action,
                    },
                );
            }
            let _ = reply.send(result);
        }

        Command::SetTradePermission {
            user_id,
            mode,
            buy_enabled,
            sell_enabled,
            reply,
        } => {
            let result = state
                .set_trade_permission(user_id, mode, buy_enabled, sell_enabled)
                .map(|account| account.permission_mode);
            let _ = reply.send(result);
        }

        Command::SetDepositAddress {
            asset,
            address,
            reply,
        } => {
            state.set_deposit_address(asset, address);
            let _ = reply.send(Ok(()));
        }

        Command::SendChatMessage {
            thread_id,
            sender_role,
            sender_id,
            body,
            reply,
        } => {
            let result = state.send_chat_message(thread_id, sender_role, sender_id, body);
            if result.is_ok() {
                metrics.chat_message();
            }
            let _ = reply.send(result);
        }

        Command::CloseSupportThread { thread_id, reply } => {
            let _ = reply.send(state.close_support_thread(thread_id));
        }
    }
}

fn record(journal: &mut Journal, event: JournalEvent) {
    // The journal is an audit trail; a write failure must not take the desk
    // down mid-session.
    if let Err(err) = journal.append(event) {
        error!("Journal append failed: {:#}", err);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Rejection, Side};
    use rust_decimal_macros::dec;
    use tokio::sync::oneshot;

    fn fixture(tag: &str) -> (State, Journal, Metrics, std::path::PathBuf) {
        let dir =
            std::env::temp_dir().join(format!("openbookpro-desk-{}-{}", tag, std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        let journal = Journal::open(&dir).unwrap();
        (State::new(dec!(10000)), journal, Metrics::new(), dir)
    }

    #[test]
    fn should_apply_a_place_order_command_and_journal_it() {
        let (mut state, mut journal, metrics, dir) = fixture("accepted");
        let user_id = state.create_customer("alice", None).unwrap().id;

        let (reply, mut rx) = oneshot::channel();
        apply(
            &mut state,
            Command::PlaceOrder {
                user_id,
                side: Side::Buy,
                quantity: dec!(1),
                price: dec!(100),
                reply,
            },
            &mut journal,
            &metrics,
        );

        let placed = rx.try_recv().unwrap().unwrap();
        assert_eq!(placed.balance, dec!(9900));

        let events = journal.read_all().unwrap();
        assert!(events
            .iter()
            .any(|e| matches!(e, JournalEvent::OrderPlaced { order_id: 1, .. })));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn should_reply_with_the_rejection_and_skip_the_journal() {
        let (mut state, mut journal, metrics, dir) = fixture("rejected");
        let user_id = state.create_customer("bob", None).unwrap().id;

        let (reply, mut rx) = oneshot::channel();
        apply(
            &mut state,
            Command::PlaceOrder {
                user_id,
                side: Side::Buy,
                quantity: dec!(1),
                price: dec!(99999),
                reply,
            },
            &mut journal,
            &metrics,
        );

        assert_eq!(
            rx.try_recv().unwrap().unwrap_err(),
            Rejection::InsufficientBalance
        );
        let events = journal.read_all().unwrap();
        assert!(!events
            .iter()
            .any(|e| matches!(e, JournalEvent::OrderPlaced { .. })));

        let _ = std::fs::remove_dir_all(&dir);
    }
}
