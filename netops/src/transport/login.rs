//! Console-style login handshake shared by Telnet and serial.

use log::debug;
use tokio::io::{AsyncRead, AsyncWrite};

use super::config::Credentials;
use crate::channel::{InboundFilter, PASSWORD_PROMPT, PromptStream, USERNAME_PROMPT};
use crate::error::{Result, TransportError};

/// Answer username/password prompts until the device prompt shows up.
///
/// Each credential is sent at most once: being asked again means the device
/// rejected the login.
pub(crate) async fn console_login<S, F>(
    stream: &mut PromptStream<S, F>,
    credentials: &Credentials,
) -> Result<String>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
    F: InboundFilter,
{
    let prompt = stream.prompt().clone();
    let mut sent_username = false;
    let mut sent_password = false;

    loop {
        let (index, output) = stream
            .read_until_any(&[&*USERNAME_PROMPT, &*PASSWORD_PROMPT, &prompt])
            .await?;

        match index {
            0 if !sent_username => {
                debug!("login: username prompt");
                stream.send(&credentials.username).await?;
                sent_username = true;
            }
            1 if !sent_password => {
                debug!("login: password prompt");
                stream.send(credentials.expose_password()).await?;
                sent_password = true;
            }
            2 => return Ok(output),
            _ => {
                return Err(TransportError::AuthenticationFailed {
                    user: credentials.username.clone(),
                }
                .into());
            }
        }
    }
}
