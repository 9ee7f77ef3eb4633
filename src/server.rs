//! Network listener answering LDAP requests from a [`DirectoryService`]
use std::{net::SocketAddr, sync::Arc};

use futures::{SinkExt, StreamExt};
use ldap3_proto::{
	proto::{
		LdapBindCred, LdapBindResponse, LdapExtendedRequest, LdapExtendedResponse, LdapModifyType,
		LdapMsg, LdapOp, LdapResult, LdapResultCode, LdapSearchRequest,
	},
	LdapCodec,
};
use tokio::{
	net::{TcpListener, TcpStream},
	task::{JoinHandle, JoinSet},
};
use tokio_util::{codec::Framed, sync::CancellationToken};
use tracing::{debug, info, warn};

use crate::{
	dn::Dn,
	entry::Entry,
	error::Error,
	service::{DirectoryService, Modification, Session, WHOAMI_OID},
};

/// A running TCP listener bound to a directory service.
#[derive(Debug)]
pub struct LdapServer {
	/// The address actually bound
	local_addr: SocketAddr,
	/// Cancels the accept loop and all connections
	shutdown: CancellationToken,
	/// The accept loop, `None` once stopped
	handle: Option<JoinHandle<()>>,
}

impl LdapServer {
	/// Bind `address` and start accepting connections in the background.
	pub async fn start(address: SocketAddr, service: Arc<DirectoryService>) -> Result<Self, Error> {
		let listener =
			TcpListener::bind(address).await.map_err(|source| Error::Bind { address, source })?;
		let local_addr = listener.local_addr()?;
		let shutdown = CancellationToken::new();
		let handle = tokio::spawn(accept_loop(listener, service, shutdown.clone()));
		info!("LDAP listener started on {local_addr}");
		Ok(LdapServer { local_addr, shutdown, handle: Some(handle) })
	}

	/// The address the listener is bound to.
	#[must_use]
	pub fn local_addr(&self) -> SocketAddr {
		self.local_addr
	}

	/// Whether the listener is still accepting connections.
	#[must_use]
	pub fn is_running(&self) -> bool {
		self.handle.is_some()
	}

	/// Stop accepting connections, close open ones, and wait for the accept
	/// loop to finish.
	pub async fn stop(&mut self) -> Result<(), Error> {
		let Some(handle) = self.handle.take() else {
			return Err(Error::NotStarted);
		};
		self.shutdown.cancel();
		if let Err(err) = handle.await {
			warn!("LDAP listener task failed: {err}");
		}
		info!("LDAP listener on {} stopped", self.local_addr);
		Ok(())
	}

	/// Signal the background tasks to stop without waiting for them.
	pub(crate) fn cancel(&mut self) {
		self.handle.take();
		self.shutdown.cancel();
	}
}

/// Accept connections until cancelled
async fn accept_loop(
	listener: TcpListener,
	service: Arc<DirectoryService>,
	shutdown: CancellationToken,
) {
	let mut connections = JoinSet::new();
	loop {
		tokio::select! {
			_ = shutdown.cancelled() => break,
			result = listener.accept() => match result {
				Ok((stream, peer)) => {
					debug!("Accepted connection from {peer}");
					let service = Arc::clone(&service);
					let shutdown = shutdown.clone();
					connections.spawn(async move {
						if let Err(err) = handle_connection(stream, service, shutdown).await {
							warn!("Connection from {peer} failed: {err}");
						}
					});
				}
				Err(err) => warn!("Failed to accept connection: {err}"),
			},
			Some(_) = connections.join_next(), if !connections.is_empty() => {}
		}
	}
	connections.shutdown().await;
}

/// Serve one client until it unbinds, disconnects, or the server stops
async fn handle_connection(
	stream: TcpStream,
	service: Arc<DirectoryService>,
	shutdown: CancellationToken,
) -> Result<(), Error> {
	let mut framed = Framed::new(stream, LdapCodec::default());
	let mut session = service.anonymous_session();
	loop {
		let msg = tokio::select! {
			_ = shutdown.cancelled() => break,
			msg = framed.next() => msg,
		};
		let Some(msg) = msg else {
			break;
		};
		let msg = msg?;
		let msgid = msg.msgid;
		let Some(responses) = dispatch(&service, &mut session, msg).await else {
			debug!("Client unbound");
			break;
		};
		for op in responses {
			framed.feed(LdapMsg { msgid, op, ctrl: Vec::new() }).await?;
		}
		framed.flush().await?;
	}
	Ok(())
}

/// Answer one request. `None` means the connection should be closed.
async fn dispatch(
	service: &Arc<DirectoryService>,
	session: &mut Session,
	msg: LdapMsg,
) -> Option<Vec<LdapOp>> {
	let responses = match msg.op {
		LdapOp::BindRequest(request) => {
			debug!("Bind as {:?}", request.dn);
			let result = match request.cred {
				LdapBindCred::Simple(password) => service.bind(&request.dn, &password).await,
				_ => Err(Error::UnwillingToPerform("only simple binds are supported".to_owned())),
			};
			let res = match result {
				Ok(bound) => {
					*session = bound;
					success()
				}
				Err(err) => {
					*session = service.anonymous_session();
					failure(&err)
				}
			};
			vec![LdapOp::BindResponse(LdapBindResponse { res, saslcreds: None })]
		}
		LdapOp::UnbindRequest => return None,
		LdapOp::SearchRequest(request) => search(session, request).await,
		LdapOp::AddRequest(request) => {
			debug!("Add {:?}", request.dn);
			let result = async {
				let mut entry = Entry::new(request.dn.parse()?);
				for attribute in request.attributes {
					entry.add(&attribute.atype, attribute.vals);
				}
				session.add(entry).await
			};
			vec![LdapOp::AddResponse(to_result(result.await))]
		}
		LdapOp::DelRequest(dn) => {
			debug!("Delete {dn:?}");
			let result = async { session.delete(&dn.parse()?).await };
			vec![LdapOp::DelResponse(to_result(result.await))]
		}
		LdapOp::ModifyRequest(request) => {
			debug!("Modify {:?}", request.dn);
			let result = async {
				let modifications = request
					.changes
					.into_iter()
					.map(|change| {
						let attr = change.modification.atype;
						let values = change.modification.vals;
						match change.operation {
							LdapModifyType::Add => Ok(Modification::Add(attr, values)),
							LdapModifyType::Delete => Ok(Modification::Delete(attr, values)),
							LdapModifyType::Replace => Ok(Modification::Replace(attr, values)),
							_ => Err(Error::UnwillingToPerform(
								"unsupported modification type".to_owned(),
							)),
						}
					})
					.collect::<Result<Vec<_>, _>>()?;
				session.modify(&request.dn.parse()?, modifications).await
			};
			vec![LdapOp::ModifyResponse(to_result(result.await))]
		}
		LdapOp::CompareRequest(request) => {
			debug!("Compare {} of {:?}", request.atype, request.dn);
			let result =
				async { session.compare(&request.dn.parse()?, &request.atype, &request.val).await };
			let res = match result.await {
				Ok(true) => with_code(LdapResultCode::CompareTrue),
				Ok(false) => with_code(LdapResultCode::CompareFalse),
				Err(err) => failure(&err),
			};
			vec![LdapOp::CompareResult(res)]
		}
		LdapOp::ModifyDNRequest(request) => {
			debug!("Rename {:?}", request.dn);
			let err = Error::UnwillingToPerform("renaming entries is not supported".to_owned());
			vec![LdapOp::ModifyDNResponse(failure(&err))]
		}
		LdapOp::ExtendedRequest(request) => vec![extended(session, &request)],
		LdapOp::AbandonRequest(msgid) => {
			debug!("Client abandoned request {msgid}");
			Vec::new()
		}
		op => {
			warn!("Ignoring unsupported operation {op:?}");
			Vec::new()
		}
	};
	Some(responses)
}

/// Run a search, returning the entries followed by the final result
async fn search(session: &Session, request: LdapSearchRequest) -> Vec<LdapOp> {
	debug!("Search {:?} with {:?}", request.base, request.filter);
	let base = match request.base.parse::<Dn>() {
		Ok(base) => base,
		Err(err) => return vec![LdapOp::SearchResultDone(failure(&err))],
	};
	let size_limit = usize::try_from(request.sizelimit).unwrap_or(0);
	let results = match session.search(&base, &request.scope, &request.filter, size_limit).await {
		Ok(results) => results,
		Err(err) => return vec![LdapOp::SearchResultDone(failure(&err))],
	};

	let mut responses: Vec<LdapOp> = results
		.entries
		.iter()
		.map(|entry| {
			LdapOp::SearchResultEntry(entry.to_search_result(&request.attrs, request.typesonly))
		})
		.collect();
	let done = if results.size_limit_exceeded {
		with_code(LdapResultCode::SizeLimitExceeded)
	} else {
		success()
	};
	responses.push(LdapOp::SearchResultDone(done));
	responses
}

/// Answer an extended operation. Only "Who am I?" is supported.
fn extended(session: &Session, request: &LdapExtendedRequest) -> LdapOp {
	if request.name != WHOAMI_OID {
		warn!("Unsupported extended operation {}", request.name);
		return LdapOp::ExtendedResponse(LdapExtendedResponse {
			res: LdapResult {
				code: LdapResultCode::ProtocolError,
				matcheddn: String::new(),
				message: format!("unsupported extended operation {}", request.name),
				referral: Vec::new(),
			},
			name: None,
			value: None,
		});
	}
	LdapOp::ExtendedResponse(LdapExtendedResponse {
		res: success(),
		name: None,
		value: Some(session.authz_id().into_bytes()),
	})
}

/// Result of a successful operation
fn success() -> LdapResult {
	with_code(LdapResultCode::Success)
}

/// Result carrying `code` and nothing else
fn with_code(code: LdapResultCode) -> LdapResult {
	LdapResult {
		code,
		matcheddn: String::new(),
		message: String::new(),
		referral: Vec::new(),
	}
}

/// Result reporting `err` to the client
fn failure(err: &Error) -> LdapResult {
	debug!("Operation failed: {err}");
	LdapResult {
		code: err.result_code(),
		matcheddn: String::new(),
		message: err.to_string(),
		referral: Vec::new(),
	}
}

/// Convert an operation outcome to an LDAP result
fn to_result(result: Result<(), Error>) -> LdapResult {
	match result {
		Ok(()) => success(),
		Err(err) => failure(&err),
	}
}
