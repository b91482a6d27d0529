use crate::bank::account::{AccountId, AccountSummary, BalanceView};
use crate::config::{BankConfig, ClientConfig};
use crate::core::codec::PacketCodec;
use crate::core::packet::Packet;
use crate::core::wire::WireCodec;
use crate::error::{BankError, Result};
use crate::protocol::message::{Request, Response};
use crate::utils::crypto::SymmetricCipher;
use crate::utils::timeout::with_timeout_error;

use futures::{SinkExt, StreamExt};
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_util::codec::Framed;
use tracing::{debug, instrument, warn};

/// Outcome of a deposit or withdrawal
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receipt {
    pub message: String,
    pub new_balance: Decimal,
}

/// Typed client for one server connection.
///
/// The helper methods turn a `status=error` reply into
/// [`BankError::Remote`]; [`BankClient::send`] returns it as a value.
///
/// A timeout or transport failure leaves the stream out of step with the
/// server, so every later call fails with [`BankError::ConnectionClosed`].
pub struct BankClient {
    framed: Framed<TcpStream, PacketCodec>,
    wire: WireCodec,
    response_timeout: Duration,
    broken: bool,
}

impl BankClient {
    #[instrument(skip(config, wire), fields(address = %config.address))]
    pub async fn connect(config: &ClientConfig, wire: WireCodec) -> Result<Self> {
        let stream = with_timeout_error(
            async { Ok(TcpStream::connect(&config.address).await?) },
            config.connection_timeout,
        )
        .await?;
        stream.set_nodelay(true)?;

        debug!(encrypted = wire.is_encrypted(), "Connected");
        Ok(Self {
            framed: Framed::new(stream, PacketCodec::default()),
            wire,
            response_timeout: config.response_timeout,
            broken: false,
        })
    }

    /// Connect using the client and transport sections of `config`
    pub async fn from_config(config: &BankConfig) -> Result<Self> {
        let wire = if config.transport.encryption_enabled {
            WireCodec::encrypted(Arc::new(SymmetricCipher::from_passphrase(
                &config.transport.passphrase,
            )))
        } else {
            WireCodec::plain()
        };
        let mut client = Self::connect(&config.client, wire).await?;
        *client.framed.codec_mut() = PacketCodec::new(config.transport.max_payload_size);
        Ok(client)
    }

    /// Whether an earlier failure made this connection unusable
    pub fn is_broken(&self) -> bool {
        self.broken
    }

    /// Send one request and wait for its response
    #[instrument(skip(self, request), fields(action = %request.kind()), level = "debug")]
    pub async fn send(&mut self, request: Request) -> Result<Response> {
        if self.broken {
            return Err(BankError::ConnectionClosed);
        }
        let kind = request.kind();
        let payload = self.wire.encode_request(&request)?;
        let timeout = self.response_timeout;

        let result = with_timeout_error(
            async {
                self.framed.send(Packet::new(payload)).await?;
                let packet = self
                    .framed
                    .next()
                    .await
                    .ok_or(BankError::ConnectionClosed)??;
                self.wire.decode_response(kind, &packet.payload)
            },
            timeout,
        )
        .await;

        if let Err(e) = &result {
            if e.closes_connection() {
                warn!(error = %e, "Connection out of step with server, marking broken");
                self.broken = true;
            }
        }
        result
    }

    pub async fn login(&mut self, username: &str, secret: &str) -> Result<AccountSummary> {
        let request = Request::Login {
            username: username.to_string(),
            secret: secret.to_string(),
        };
        match self.send(request).await? {
            Response::LoggedIn(summary) => Ok(summary),
            other => Err(unexpected(other)),
        }
    }

    pub async fn balance(&mut self, account_id: AccountId) -> Result<BalanceView> {
        match self.send(Request::Balance { account_id }).await? {
            Response::Balance {
                balance,
                account_number,
            } => Ok(BalanceView {
                balance,
                account_number,
            }),
            other => Err(unexpected(other)),
        }
    }

    pub async fn deposit(&mut self, account_id: AccountId, amount: Decimal) -> Result<Receipt> {
        let response = self.send(Request::Deposit { account_id, amount }).await?;
        receipt(response)
    }

    pub async fn withdraw(&mut self, account_id: AccountId, amount: Decimal) -> Result<Receipt> {
        let response = self.send(Request::Withdraw { account_id, amount }).await?;
        receipt(response)
    }

    /// End the session; the server closes the connection after replying
    pub async fn logout(mut self) -> Result<String> {
        match self.send(Request::Logout).await? {
            Response::LoggedOut { message } => Ok(message),
            other => Err(unexpected(other)),
        }
    }
}

fn receipt(response: Response) -> Result<Receipt> {
    match response {
        Response::Transaction {
            message,
            new_balance,
        } => Ok(Receipt {
            message,
            new_balance,
        }),
        other => Err(unexpected(other)),
    }
}

fn unexpected(response: Response) -> BankError {
    match response {
        Response::Error { message } => BankError::Remote(message),
        other => BankError::Codec(format!("Unexpected response: {other:?}")),
    }
}
