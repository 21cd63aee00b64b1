//! Length-prefixed JSON framing over the child's stdin/stdout, the same
//! shape as the blob-tree wire format's length-prefixed byte fields (a
//! 4-byte big-endian count followed by that many bytes) but carrying a
//! `serde_json`-encoded command or notification instead of opaque bytes.

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

pub async fn write_message<W, T>(writer: &mut W, message: &T) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let bytes = serde_json::to_vec(message)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
    writer.write_u32(bytes.len() as u32).await?;
    writer.write_all(&bytes).await?;
    writer.flush().await?;
    Ok(())
}

pub async fn read_message<R, T>(reader: &mut R) -> std::io::Result<T>
where
    R: AsyncRead + Unpin,
    T: DeserializeOwned,
{
    let len = reader.read_u32().await?;
    let mut buf = vec![0u8; len as usize];
    reader.read_exact(&mut buf).await?;
    serde_json::from_slice(&buf).map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Sample {
        a: u32,
        b: String,
    }

    #[tokio::test]
    async fn round_trips_through_an_in_memory_pipe() {
        let (mut read_half, mut write_half) = tokio::io::duplex(1024);
        let msg = Sample {
            a: 7,
            b: "hi".into(),
        };
        write_message(&mut write_half, &msg).await.unwrap();
        let decoded: Sample = read_message(&mut read_half).await.unwrap();
        assert_eq!(decoded, msg);
    }
}
