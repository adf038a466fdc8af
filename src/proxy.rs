//! SOCKS4a proxy dialer for outbound feeds.

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::{DaemonError, Result};

const SOCKS4_VERSION: u8 = 0x04;
const SOCKS4_CONNECT: u8 = 0x01;
const SOCKS4_GRANTED: u8 = 0x5a;
const USERID: &[u8] = b"srndv2";

/// Connects to `proxy_addr` and asks it to tunnel a connection to
/// `dest_host:dest_port` via SOCKS4a (remote DNS resolution, `0.0.0.1`
/// sentinel address).
pub async fn connect_via_socks4a(
    proxy_addr: &str,
    dest_host: &str,
    dest_port: u16,
) -> Result<TcpStream> {
    let mut stream = TcpStream::connect(proxy_addr)
        .await
        .map_err(|e| DaemonError::Proxy(format!("dialing proxy {proxy_addr}: {e}")))?;

    let mut request = Vec::with_capacity(9 + USERID.len() + 1 + dest_host.len() + 1);
    request.push(SOCKS4_VERSION);
    request.push(SOCKS4_CONNECT);
    request.extend_from_slice(&dest_port.to_be_bytes());
    request.extend_from_slice(&[0, 0, 0, 1]); // 0.0.0.1 sentinel
    request.extend_from_slice(USERID);
    request.push(0);
    request.extend_from_slice(dest_host.as_bytes());
    request.push(0);

    stream
        .write_all(&request)
        .await
        .map_err(|e| DaemonError::Proxy(format!("writing SOCKS4a request: {e}")))?;

    let mut reply = [0u8; 8];
    stream
        .read_exact(&mut reply)
        .await
        .map_err(|e| DaemonError::Proxy(format!("reading SOCKS4a reply: {e}")))?;

    if reply[1] != SOCKS4_GRANTED {
        return Err(DaemonError::Proxy(format!(
            "SOCKS4a request rejected, CD=0x{:02x}",
            reply[1]
        )));
    }

    Ok(stream)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    async fn fake_proxy(reply_cd: u8) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        tokio::spawn(async move {
            if let Ok((mut socket, _)) = listener.accept().await {
                let mut buf = vec![0u8; 256];
                let _ = socket.read(&mut buf).await;
                let _ = socket.write_all(&[0, reply_cd, 0, 0, 0, 0, 0, 0]).await;
            }
        });
        addr
    }

    #[tokio::test]
    async fn test_socks4a_success() {
        let proxy_addr = fake_proxy(0x5a).await;
        let result = connect_via_socks4a(&proxy_addr, "news.example.com", 119).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_socks4a_rejection() {
        // S6: proxy returns 0x5b instead of 0x5a.
        let proxy_addr = fake_proxy(0x5b).await;
        let result = connect_via_socks4a(&proxy_addr, "news.example.com", 119).await;
        assert!(result.is_err());
    }

    #[test]
    fn test_request_encoding() {
        let mut request = Vec::new();
        request.push(SOCKS4_VERSION);
        request.push(SOCKS4_CONNECT);
        request.extend_from_slice(&119u16.to_be_bytes());
        request.extend_from_slice(&[0, 0, 0, 1]);
        request.extend_from_slice(USERID);
        request.push(0);
        request.extend_from_slice(b"host");
        request.push(0);
        assert_eq!(request[0], 0x04);
        assert_eq!(request[1], 0x01);
        assert_eq!(&request[2..4], &[0, 119]);
        assert_eq!(&request[4..8], &[0, 0, 0, 1]);
        assert_eq!(request.len(), 9 + USERID.len() + 1 + "host".len());
    }
}
