//! Simulated registry
//!
//! Drives the registry side of the distribution exchange over any duplex
//! stream, so protocol tests can run against `tokio::io::duplex` or a real
//! socket.

use cosign_core::{
    CosignError, CryptoEffects, CryptoEffectsExt, QueryBatch, RecipientKey, RegistryId,
    RegistryRequest, Result, SignedQuery,
};
use cosign_effects::LineTransport;
use std::collections::BTreeMap;
use tokio::io::{split, AsyncRead, AsyncWrite, BufReader, ReadHalf, WriteHalf};

/// Reply payload: query id to co-signed document
pub type SignedReply = BTreeMap<String, SignedQuery>;

/// Registry client bound to one identity
#[derive(Debug, Clone)]
pub struct RegistryClient<C> {
    registry: RegistryId,
    crypto: C,
    server_key: RecipientKey,
    transport: LineTransport,
}

/// Open exchange after the batch has been received
pub struct RegistrySession<S> {
    reader: BufReader<ReadHalf<S>>,
    writer: WriteHalf<S>,
}

impl<C: CryptoEffects> RegistryClient<C> {
    /// Client claiming `registry`, replying to the server at `server_key`
    pub fn new(registry: impl Into<RegistryId>, crypto: C, server_key: RecipientKey) -> Self {
        Self {
            registry: registry.into(),
            crypto,
            server_key,
            transport: LineTransport::default(),
        }
    }

    /// Registry id this client claims
    pub fn registry(&self) -> &RegistryId {
        &self.registry
    }

    /// Send the request line without waiting for anything
    pub async fn send_request<S>(&self, stream: S) -> Result<RegistrySession<S>>
    where
        S: AsyncRead + AsyncWrite,
    {
        let (reader, mut writer) = split(stream);
        let request = serde_json::to_string(&RegistryRequest {
            source_id: self.registry.clone(),
        })?;
        self.transport.write_line(&mut writer, &request).await?;
        Ok(RegistrySession {
            reader: BufReader::new(reader),
            writer,
        })
    }

    /// Send the request and read the encrypted batch
    pub async fn open<S>(&self, stream: S) -> Result<(QueryBatch, RegistrySession<S>)>
    where
        S: AsyncRead + AsyncWrite,
    {
        let mut session = self.send_request(stream).await?;
        let frame = self
            .transport
            .read_line(&mut session.reader)
            .await?
            .ok_or_else(|| CosignError::network("server closed before sending a batch"))?;
        let batch = self.crypto.open_json(&frame).await?;
        Ok((batch, session))
    }

    /// Co-sign every query in `batch` on top of its current chain
    pub async fn cosign(&self, batch: &QueryBatch) -> Result<SignedReply> {
        let mut reply = SignedReply::new();
        for record in &batch.queries {
            let signed = self.crypto.attest(record.signed.clone()).await?;
            reply.insert(record.id.to_string(), signed);
        }
        Ok(reply)
    }

    /// Encrypt and send `reply`, then wait for the server to close
    pub async fn reply<S>(&self, mut session: RegistrySession<S>, reply: &SignedReply) -> Result<()>
    where
        S: AsyncRead + AsyncWrite,
    {
        let frame = self.crypto.seal_json(reply, &self.server_key).await?;
        self.transport
            .write_line(&mut session.writer, &frame)
            .await?;
        while self.transport.read_line(&mut session.reader).await?.is_some() {}
        Ok(())
    }

    /// Full honest exchange; returns the batch that was offered
    pub async fn sign_all<S>(&self, stream: S) -> Result<QueryBatch>
    where
        S: AsyncRead + AsyncWrite,
    {
        let (batch, session) = self.open(stream).await?;
        let reply = self.cosign(&batch).await?;
        self.reply(session, &reply).await?;
        Ok(batch)
    }
}
