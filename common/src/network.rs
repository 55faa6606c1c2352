use anyhow::bail;
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

#[derive(Deserialize, Serialize, Debug, PartialEq, Eq)]
pub enum Request {
    ResolveGame { game_id: String },
    LevelInfo { user_id: String },
    Leaderboard { limit: u32 },
}

#[derive(Serialize, Deserialize, Debug, PartialEq)]
pub enum Response {
    GameResolved { game_id: String, already_resolved: bool },
    LevelInfo(crate::LevelInfo),
    Leaderboard(Vec<crate::User>),
}

#[derive(Serialize, Deserialize, Debug, PartialEq)]
pub enum Packet {
    RequestPacket(Request),
    ResponsePacket(Response),
    Error(String),
}

/// A MessagePack-framed websocket carrying [`Packet`]s.
pub struct Connection<S> {
    socket: WebSocketStream<S>,
}

impl Connection<TcpStream> {
    pub async fn from_tcp_stream(connection: TcpStream) -> anyhow::Result<Self> {
        let socket = tokio_tungstenite::accept_async(connection).await?;
        Ok(Self { socket })
    }
}

impl Connection<MaybeTlsStream<TcpStream>> {
    pub async fn connect(address: &str) -> anyhow::Result<Self> {
        let (socket, _) = tokio_tungstenite::connect_async(address).await?;
        Ok(Self { socket })
    }
}

impl<S: AsyncRead + AsyncWrite + Unpin> Connection<S> {
    /// Reads the next packet, or `None` once the peer has closed the socket.
    pub async fn read(&mut self) -> anyhow::Result<Option<Packet>> {
        while let Some(message) = self.socket.next().await {
            match message? {
                Message::Binary(data) => return Ok(Some(rmp_serde::from_slice(&data)?)),
                Message::Close(_) => return Ok(None),
                Message::Ping(_) | Message::Pong(_) => continue,
                _ => bail!("incorrect data type received"),
            }
        }
        Ok(None)
    }

    pub async fn send(&mut self, data: Packet) -> anyhow::Result<()> {
        let buf = rmp_serde::to_vec(&data)?;
        Ok(self.socket.send(Message::Binary(buf)).await?)
    }
}
