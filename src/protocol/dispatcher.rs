use crate::bank::engine::TransactionEngine;
use crate::error::{constants, BankError, Result};
use crate::protocol::message::{Request, Response};
use crate::protocol::session::Session;
use std::sync::Arc;
use tracing::{debug, warn};

/// Routes typed requests to the engine on behalf of one session.
///
/// Authorization lives here: anything but `login`/`logout` needs an
/// authenticated session, and the request may only name the session's own
/// account. Every error becomes an error response; nothing escapes.
#[derive(Clone)]
pub struct Dispatcher {
    engine: Arc<TransactionEngine>,
}

impl Dispatcher {
    pub fn new(engine: Arc<TransactionEngine>) -> Self {
        Self { engine }
    }

    pub fn engine(&self) -> &Arc<TransactionEngine> {
        &self.engine
    }

    /// Execute `request` and return the updated session with the response.
    ///
    /// Blocking; call from a blocking-pool thread when inside a runtime.
    pub fn dispatch(&self, session: Session, request: Request) -> (Session, Response) {
        let kind = request.kind();
        match self.execute(session, request) {
            Ok(outcome) => outcome,
            Err(e) => {
                debug!(action = %kind, error = %e, "Request rejected");
                (session, Response::error(e.client_message()))
            }
        }
    }

    fn execute(&self, session: Session, request: Request) -> Result<(Session, Response)> {
        match request {
            Request::Login { username, secret } => {
                let summary = self.engine.login(&username, &secret)?;
                let session = session.authenticate(summary.account_id);
                Ok((session, Response::LoggedIn(summary)))
            }
            Request::Logout => Ok((
                session.close(),
                Response::LoggedOut {
                    message: "Logged out".to_string(),
                },
            )),
            request => {
                authorize(session, &request)?;
                let response = match request {
                    Request::Balance { account_id } => {
                        let view = self.engine.get_balance(account_id)?;
                        Response::Balance {
                            balance: view.balance,
                            account_number: view.account_number,
                        }
                    }
                    Request::Deposit { account_id, amount } => {
                        let new_balance = self.engine.deposit(account_id, amount)?;
                        Response::Transaction {
                            message: format!("Deposited ${amount:.2}"),
                            new_balance,
                        }
                    }
                    Request::Withdraw { account_id, amount } => {
                        let new_balance = self.engine.withdraw(account_id, amount)?;
                        Response::Transaction {
                            message: format!("Withdrew ${amount:.2}"),
                            new_balance,
                        }
                    }
                    Request::Login { .. } | Request::Logout => {
                        return Err(BankError::Validation(constants::ERR_INVALID_ACTION.into()))
                    }
                };
                Ok((session, response))
            }
        }
    }
}

fn authorize(session: Session, request: &Request) -> Result<()> {
    let Some(bound) = session.account_id() else {
        warn!(action = %request.kind(), "Unauthenticated request refused");
        return Err(BankError::Authorization(constants::ERR_AUTH_REQUIRED.to_string()));
    };
    match request.account_id() {
        Some(requested) if requested != bound => {
            warn!(%bound, %requested, "Request for another customer's account refused");
            Err(BankError::Authorization(constants::ERR_FOREIGN_ACCOUNT.to_string()))
        }
        _ => Ok(()),
    }
}
