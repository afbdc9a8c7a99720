//! This module defines the [Server] and [Client] types (along with [Request]
//! and [ResponseHandle]) for working with a two-way SPSC (single producer
//! single consumer) requesting system, useful in situations with a single
//! thread making requests and another single thread responding.

use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex};

use super::{ChannelError, ChannelResult, THREAD_PANIC_MSG};

/// The request data from a [Client] (`Q`) and the handle from the [Server]
/// that is used to respond to it.
pub type ReqRes<Q, A> = (Q, ResponseHandle<A>);

/// The server (request receiver/responder) of a two-way message channel.
/// Also see [Client].
///
/// See [new] to construct.
#[derive(Debug)]
pub struct Server<Q, A> {
    channel: Arc<Channel<Q, A>>,
}

impl<Q, A> Server<Q, A> {
    /// Waits for a request from the client until one appears.
    ///
    /// A [ChannelError::ConnectionDropped] error is returned if the client was
    /// dropped and there are no more requests in the queue.
    ///
    /// # Example
    ///
    /// ```ignore
    /// while let Ok((req, res)) = server.wait() {
    ///     // Do something with `req`...
    ///
    ///     // Respond to the request.
    ///     res.respond("Request handled.").unwrap();
    /// }
    /// ```
    pub fn wait(&self) -> ChannelResult<ReqRes<Q, A>> {
        let mut queue = self.channel.queue.lock().expect(THREAD_PANIC_MSG);

        loop {
            if let Some(req_res) = queue.requests.pop_front() {
                return Ok(req_res);
            }
            if !queue.client_connected {
                return Err(ChannelError::ConnectionDropped);
            }
            queue = self.channel.notifier.wait(queue).expect(THREAD_PANIC_MSG);
        }
    }
}

impl<Q, A> Drop for Server<Q, A> {
    fn drop(&mut self) {
        // Dropping the queued response handles tells every waiting client that
        // no response is coming.
        let abandoned = {
            let mut queue = self.channel.queue.lock().expect(THREAD_PANIC_MSG);
            queue.server_connected = false;
            std::mem::take(&mut queue.requests)
        };
        drop(abandoned);
    }
}

/// The client (request sender) of a two-way message channel. Also see
/// [Server].
///
/// See [new] to construct.
#[derive(Debug)]
pub struct Client<Q, A> {
    channel: Arc<Channel<Q, A>>,
}

impl<Q, A> Client<Q, A> {
    /// Send a request to the server, returning a [Request] that can be used to
    /// wait for the response.
    ///
    /// A [ChannelError::ConnectionDropped] error is returned if the server was
    /// dropped.
    pub fn request(&self, request: Q) -> ChannelResult<Request<A>> {
        let responder = Arc::new(Responder {
            state: Mutex::new(ResponseState {
                response: None,
                abandoned: false,
            }),
            notifier: Condvar::default(),
        });

        self.push((request, ResponseHandle(responder.clone())))?;

        Ok(Request(Some(responder)))
    }

    /// The number of requests the server hasn't picked up yet.
    pub fn requests_in_flight(&self) -> usize {
        self.channel
            .queue
            .lock()
            .expect(THREAD_PANIC_MSG)
            .requests
            .len()
    }

    fn push(&self, req_res: ReqRes<Q, A>) -> ChannelResult<()> {
        let mut queue = self.channel.queue.lock().expect(THREAD_PANIC_MSG);

        if !queue.server_connected {
            return Err(ChannelError::ConnectionDropped);
        }

        queue.requests.push_back(req_res);
        self.channel.notifier.notify_one();

        Ok(())
    }
}

impl<Q, A> Drop for Client<Q, A> {
    fn drop(&mut self) {
        self.channel
            .queue
            .lock()
            .expect(THREAD_PANIC_MSG)
            .client_connected = false;

        // The server may be waiting for a request that will never come.
        self.channel.notifier.notify_all();
    }
}

/// A handle to use for responding to a request from a [Client].
///
/// Dropping the handle without responding tells the client no response is
/// coming.
#[derive(Debug)]
pub struct ResponseHandle<A>(Arc<Responder<A>>);

impl<A> ResponseHandle<A> {
    /// Respond to the request. A [ChannelError::ConnectionDropped] error is
    /// returned if the client's [Request] was already dropped.
    pub fn respond(self, response: A) -> ChannelResult<()> {
        if Arc::strong_count(&self.0) < 2 {
            return Err(ChannelError::ConnectionDropped);
        }

        self.0
            .state
            .lock()
            .expect(THREAD_PANIC_MSG)
            .response
            .replace(response);

        // `Drop` does the notifying.
        Ok(())
    }
}

impl<A> Drop for ResponseHandle<A> {
    fn drop(&mut self) {
        let mut state = self.0.state.lock().expect(THREAD_PANIC_MSG);
        if state.response.is_none() {
            state.abandoned = true;
        }
        drop(state);

        self.0.notifier.notify_one();
    }
}

/// A handle to use to await a response to a request from a [Server].
#[derive(Debug)]
pub struct Request<A>(Option<Arc<Responder<A>>>);

impl<A> Request<A> {
    /// Wait until the server responds.
    ///
    /// A [ChannelError::ConnectionDropped] error is returned if the server
    /// dropped the request without responding.
    pub fn wait(&mut self) -> ChannelResult<A> {
        let responder = self
            .0
            .as_ref()
            .ok_or(ChannelError::ResponseAlreadyReceived)?;

        let mut state = responder.state.lock().expect(THREAD_PANIC_MSG);

        let response = loop {
            if let Some(response) = state.response.take() {
                break response;
            }
            if state.abandoned {
                return Err(ChannelError::ConnectionDropped);
            }
            state = responder.notifier.wait(state).expect(THREAD_PANIC_MSG);
        };

        drop(state);
        self.0 = None;
        Ok(response)
    }

    /// Take the response if the server already responded, returning [None]
    /// otherwise. This function will not wait.
    pub fn check(&mut self) -> ChannelResult<Option<A>> {
        let responder = self
            .0
            .as_ref()
            .ok_or(ChannelError::ResponseAlreadyReceived)?;

        let mut state = responder.state.lock().expect(THREAD_PANIC_MSG);

        match state.response.take() {
            Some(response) => {
                drop(state);
                self.0 = None;
                Ok(Some(response))
            }
            None if state.abandoned => Err(ChannelError::ConnectionDropped),
            None => Ok(None),
        }
    }
}

/// Create a two-way message channel's [Server] and [Client].
///
/// `Q` is the request type. `A` is the response type.
///
/// - The server will be able to receive requests as long as the client hasn't
///   been dropped (queued requests are still delivered after that).
/// - The client will be able to send requests as long as the server hasn't been
///   dropped.
pub fn new<Q, A>() -> (Server<Q, A>, Client<Q, A>) {
    let channel = Arc::new(Channel {
        queue: Mutex::new(Queue {
            requests: VecDeque::new(),
            client_connected: true,
            server_connected: true,
        }),
        notifier: Condvar::default(),
    });

    (
        Server {
            channel: channel.clone(),
        },
        Client { channel },
    )
}

#[derive(Debug)]
struct Channel<Q, A> {
    queue: Mutex<Queue<Q, A>>,
    notifier: Condvar,
}

#[derive(Debug)]
struct Queue<Q, A> {
    requests: VecDeque<ReqRes<Q, A>>,
    client_connected: bool,
    server_connected: bool,
}

#[derive(Debug)]
struct Responder<A> {
    state: Mutex<ResponseState<A>>,
    notifier: Condvar,
}

#[derive(Debug)]
struct ResponseState<A> {
    response: Option<A>,
    abandoned: bool,
}
