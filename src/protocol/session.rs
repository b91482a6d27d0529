use crate::bank::account::AccountId;

/// Per-connection authentication state.
///
/// ```text
/// Unauthenticated --login ok--> Authenticated --logout/error--> Closed
///        |                                                        ^
///        +----------------------- error/EOF ----------------------+
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Session {
    #[default]
    Unauthenticated,
    Authenticated {
        account_id: AccountId,
    },
    Closed,
}

impl Session {
    pub fn account_id(&self) -> Option<AccountId> {
        match self {
            Session::Authenticated { account_id } => Some(*account_id),
            _ => None,
        }
    }

    pub fn is_closed(&self) -> bool {
        matches!(self, Session::Closed)
    }

    /// Successful login. Re-authenticating replaces the bound account.
    pub fn authenticate(self, account_id: AccountId) -> Self {
        match self {
            Session::Closed => Session::Closed,
            _ => Session::Authenticated { account_id },
        }
    }

    pub fn close(self) -> Self {
        Session::Closed
    }
}
