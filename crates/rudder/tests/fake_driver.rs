// Copyright 2026 the rudder authors
// Licensed under the Apache License, Version 2.0

//! Protocol-level tests against a scripted in-process driver.
//!
//! The "driver" here is the far end of a duplex pipe speaking the real
//! framing: each test reads the calls the client sends and answers with
//! hand-written create/reply/event frames. No browser, no child process.

use rudder::driver::DriverSlot;
use rudder::error::Error;
use rudder::proto::{Browser, BrowserContext, Page, Session};
use rudder::rpc::connection::{Connection, Rpc};
use rudder::rpc::remote_object::RemoteObject;
use rudder::rpc::transport::{PipeTransport, write_frame};
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, DuplexStream, ReadHalf, WriteHalf};

struct FakeDriver {
    read: ReadHalf<DuplexStream>,
    write: WriteHalf<DuplexStream>,
}

impl FakeDriver {
    /// Next call frame the client wrote.
    async fn recv(&mut self) -> Value {
        let mut length_bytes = [0u8; 4];
        self.read.read_exact(&mut length_bytes).await.unwrap();
        let length = u32::from_le_bytes(length_bytes) as usize;
        let mut payload = vec![0u8; length];
        self.read.read_exact(&mut payload).await.unwrap();
        serde_json::from_slice(&payload).unwrap()
    }

    async fn send(&mut self, frame: Value) {
        write_frame(&mut self.write, &frame).await.unwrap();
    }

    async fn create(&mut self, parent: &str, type_name: &str, guid: &str, initializer: Value) {
        self.send(json!({
            "guid": parent,
            "method": "__create__",
            "params": {"type": type_name, "guid": guid, "initializer": initializer},
        }))
        .await;
    }

    async fn dispose(&mut self, guid: &str) {
        self.send(json!({"guid": guid, "method": "__dispose__", "params": {}}))
            .await;
    }

    async fn event(&mut self, guid: &str, method: &str, params: Value) {
        self.send(json!({"guid": guid, "method": method, "params": params}))
            .await;
    }

    async fn reply(&mut self, id: u64, result: Value) {
        self.send(json!({"id": id, "result": result})).await;
    }
}

fn connect() -> (Arc<Connection>, FakeDriver) {
    let (client, server) = tokio::io::duplex(1 << 16);
    let (client_read, client_write) = tokio::io::split(client);
    let (server_read, server_write) = tokio::io::split(server);

    let (transport, frame_rx) = PipeTransport::new(client_write, client_read);
    let (writer, reader) = transport.into_parts();
    let connection = Arc::new(Connection::new(writer, reader, frame_rx, DriverSlot::empty()));

    let pump = Arc::clone(&connection);
    tokio::spawn(async move { pump.run().await });

    (
        connection,
        FakeDriver {
            read: server_read,
            write: server_write,
        },
    )
}

/// Script the bootstrap: announce the session object tree, then answer
/// `initialize`.
async fn handshake(connection: &Arc<Connection>, driver: &mut FakeDriver) -> Session {
    let client = {
        let connection = Arc::clone(connection);
        tokio::spawn(async move { connection.initialize_session().await })
    };

    let call = driver.recv().await;
    assert_eq!(call["method"], "initialize");
    assert_eq!(call["guid"], "");
    assert_eq!(call["params"]["sdkLanguage"], "javascript");

    for name in ["chromium", "firefox", "webkit"] {
        driver
            .create(
                "",
                "BrowserType",
                &format!("browser-type@{name}"),
                json!({"name": name, "executablePath": format!("/opt/{name}/bin")}),
            )
            .await;
    }
    driver.create("", "Selectors", "selectors", json!({})).await;
    driver
        .create(
            "",
            "Playwright",
            "playwright",
            json!({
                "chromium": {"guid": "browser-type@chromium"},
                "firefox": {"guid": "browser-type@firefox"},
                "webkit": {"guid": "browser-type@webkit"},
                "selectors": {"guid": "selectors"},
            }),
        )
        .await;
    driver
        .reply(
            call["id"].as_u64().unwrap(),
            json!({"playwright": {"guid": "playwright"}}),
        )
        .await;

    let object = client.await.unwrap().unwrap();
    object.as_any().downcast_ref::<Session>().unwrap().clone()
}

/// Script a full launch: browser, context, one page with its main frame.
async fn launch_page(
    session: &Session,
    driver: &mut FakeDriver,
) -> (Browser, BrowserContext, Page) {
    let browser_type = session.chromium().unwrap();
    let client = tokio::spawn(async move { browser_type.launch().await });
    let call = driver.recv().await;
    assert_eq!(call["method"], "launch");
    driver
        .create(
            "browser-type@chromium",
            "Browser",
            "browser@1",
            json!({"version": "140.0"}),
        )
        .await;
    driver
        .reply(call["id"].as_u64().unwrap(), json!({"browser": {"guid": "browser@1"}}))
        .await;
    let browser = client.await.unwrap().unwrap();

    let handle = browser.clone();
    let client = tokio::spawn(async move { handle.new_context().await });
    let call = driver.recv().await;
    assert_eq!(call["method"], "newContext");
    driver
        .create("browser@1", "BrowserContext", "browser-context@1", json!({}))
        .await;
    driver
        .reply(
            call["id"].as_u64().unwrap(),
            json!({"context": {"guid": "browser-context@1"}}),
        )
        .await;
    let context = client.await.unwrap().unwrap();

    let handle = context.clone();
    let client = tokio::spawn(async move { handle.new_page().await });
    let call = driver.recv().await;
    assert_eq!(call["method"], "newPage");
    driver
        .create(
            "browser-context@1",
            "Page",
            "page@1",
            json!({"mainFrame": {"guid": "frame@1"}, "isClosed": false}),
        )
        .await;
    driver
        .create(
            "page@1",
            "Frame",
            "frame@1",
            json!({"name": "", "url": "about:blank"}),
        )
        .await;
    driver
        .event("browser-context@1", "page", json!({"page": {"guid": "page@1"}}))
        .await;
    driver
        .reply(call["id"].as_u64().unwrap(), json!({"page": {"guid": "page@1"}}))
        .await;
    let page = client.await.unwrap().unwrap();

    (browser, context, page)
}

#[tokio::test]
async fn handshake_resolves_the_session_tree() {
    let (connection, mut driver) = connect();
    let session = handshake(&connection, &mut driver).await;

    assert_eq!(session.chromium().unwrap().name(), "chromium");
    assert_eq!(session.firefox().unwrap().name(), "firefox");
    assert_eq!(session.webkit().unwrap().name(), "webkit");
    assert!(session.selectors().is_ok());
}

#[tokio::test]
async fn replies_resolve_by_id_not_by_order() {
    let (connection, mut driver) = connect();
    let _session = handshake(&connection, &mut driver).await;

    let first = {
        let connection = Arc::clone(&connection);
        tokio::spawn(async move {
            connection
                .send_call("playwright", "first", json!({}), None)
                .await
        })
    };
    let first_call = driver.recv().await;
    let second = {
        let connection = Arc::clone(&connection);
        tokio::spawn(async move {
            connection
                .send_call("playwright", "second", json!({}), None)
                .await
        })
    };
    let second_call = driver.recv().await;

    // Answer in reverse order; each caller still gets its own result.
    driver
        .reply(second_call["id"].as_u64().unwrap(), json!({"tag": "second"}))
        .await;
    driver
        .reply(first_call["id"].as_u64().unwrap(), json!({"tag": "first"}))
        .await;

    assert_eq!(first.await.unwrap().unwrap()["tag"], "first");
    assert_eq!(second.await.unwrap().unwrap()["tag"], "second");
}

#[tokio::test]
async fn unsolicited_reply_poisons_the_connection() {
    let (connection, mut driver) = connect();
    let _session = handshake(&connection, &mut driver).await;

    let pending = {
        let connection = Arc::clone(&connection);
        tokio::spawn(async move {
            connection
                .send_call("playwright", "slow", json!({}), None)
                .await
        })
    };
    driver.recv().await;
    driver.reply(9999, json!({})).await;

    // The in-flight call is rejected with the poisoning error.
    match pending.await.unwrap() {
        Err(Error::Protocol(message)) => assert!(message.contains("9999")),
        other => panic!("expected protocol error, got {:?}", other.map(|_| ())),
    }
    // And the connection refuses further work.
    let refused = connection
        .send_call("playwright", "after", json!({}), None)
        .await;
    assert!(matches!(refused, Err(Error::Protocol(_))));
}

#[tokio::test]
async fn dispose_cascades_and_rejects_in_flight_calls() {
    let (connection, mut driver) = connect();
    let session = handshake(&connection, &mut driver).await;
    let (browser, context, page) = launch_page(&session, &mut driver).await;

    let pending = {
        let page = page.clone();
        tokio::spawn(async move { page.title().await })
    };
    let call = driver.recv().await;
    assert_eq!(call["method"], "title");
    assert_eq!(call["guid"], "frame@1");

    // Disposing the browser takes the whole subtree with it.
    driver.dispose("browser@1").await;

    match pending.await.unwrap() {
        Err(e) if e.is_target_closed() => {}
        other => panic!("expected target-closed, got {:?}", other.map(|_| ())),
    }

    // The late reply to the rejected call is discarded, not fatal.
    driver.reply(call["id"].as_u64().unwrap(), json!({"value": "late"})).await;

    assert!(page.is_closed());
    assert!(!browser.is_connected());
    assert!(context.pages().is_empty());
    assert!(connection.lookup("page@1").is_none());
    assert!(connection.lookup("frame@1").is_none());
    assert!(connection.lookup("browser-context@1").is_none());

    // The session itself is untouched.
    let alive = {
        let connection = Arc::clone(&connection);
        tokio::spawn(async move {
            connection
                .send_call("playwright", "ping", json!({}), None)
                .await
        })
    };
    let call = driver.recv().await;
    driver.reply(call["id"].as_u64().unwrap(), json!({"pong": true})).await;
    assert_eq!(alive.await.unwrap().unwrap()["pong"], true);
}

#[tokio::test]
async fn repeated_dispose_is_harmless() {
    let (connection, mut driver) = connect();
    let session = handshake(&connection, &mut driver).await;
    let (_browser, _context, page) = launch_page(&session, &mut driver).await;

    driver.dispose("page@1").await;
    driver.dispose("page@1").await;

    // Prove the connection survived both by doing a round trip.
    let alive = {
        let connection = Arc::clone(&connection);
        tokio::spawn(async move {
            connection
                .send_call("playwright", "ping", json!({}), None)
                .await
        })
    };
    let call = driver.recv().await;
    driver.reply(call["id"].as_u64().unwrap(), json!({})).await;
    assert!(alive.await.unwrap().is_ok());
    assert!(page.is_closed());
}

#[tokio::test]
async fn event_for_unknown_object_is_fatal() {
    let (connection, mut driver) = connect();
    let _session = handshake(&connection, &mut driver).await;

    driver.event("no-such-object", "close", json!({})).await;

    // Poisoning is asynchronous; wait for the dispatcher to see the frame.
    tokio::time::timeout(Duration::from_secs(5), async {
        while !connection.is_closed() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("connection should have been poisoned");

    let refused = connection
        .send_call("playwright", "after", json!({}), None)
        .await;
    assert!(matches!(refused, Err(Error::Protocol(_))));
}

#[tokio::test]
async fn duplicate_guid_is_fatal() {
    let (connection, mut driver) = connect();
    let _session = handshake(&connection, &mut driver).await;

    driver.create("", "Selectors", "selectors", json!({})).await;

    tokio::time::timeout(Duration::from_secs(5), async {
        while !connection.is_closed() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("connection should have been poisoned");
}

#[tokio::test]
async fn late_reply_after_deadline_is_discarded() {
    let (connection, mut driver) = connect();
    let _session = handshake(&connection, &mut driver).await;

    let timed_out = {
        let connection = Arc::clone(&connection);
        tokio::spawn(async move {
            connection
                .send_call(
                    "playwright",
                    "slow",
                    json!({}),
                    Some(Duration::from_millis(20)),
                )
                .await
        })
    };
    let call = driver.recv().await;
    assert!(matches!(timed_out.await.unwrap(), Err(Error::Timeout(_))));

    // The reply arrives after the caller gave up.
    driver.reply(call["id"].as_u64().unwrap(), json!({"value": 1})).await;

    // Still healthy.
    let alive = {
        let connection = Arc::clone(&connection);
        tokio::spawn(async move {
            connection
                .send_call("playwright", "ping", json!({}), None)
                .await
        })
    };
    let call = driver.recv().await;
    driver.reply(call["id"].as_u64().unwrap(), json!({})).await;
    assert!(alive.await.unwrap().is_ok());
}

#[tokio::test]
async fn context_tracks_pages_announced_by_events() {
    let (connection, mut driver) = connect();
    let session = handshake(&connection, &mut driver).await;
    let (_browser, context, page) = launch_page(&session, &mut driver).await;

    let pages = context.pages();
    assert_eq!(pages.len(), 1);
    assert_eq!(pages[0].core().guid(), page.core().guid());

    // A popup the driver opens on its own shows up the same way.
    let expecting = {
        let context = context.clone();
        tokio::spawn(async move { context.expect_page().await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;
    driver
        .create(
            "browser-context@1",
            "Page",
            "page@2",
            json!({"mainFrame": {"guid": "frame@2"}, "isClosed": false}),
        )
        .await;
    driver
        .create(
            "page@2",
            "Frame",
            "frame@2",
            json!({"name": "", "url": "about:blank"}),
        )
        .await;
    driver
        .event("browser-context@1", "page", json!({"page": {"guid": "page@2"}}))
        .await;

    let popup = expecting.await.unwrap().unwrap();
    assert_eq!(popup.core().guid().as_ref(), "page@2");
    assert_eq!(context.pages().len(), 2);

    driver.dispose("page@2").await;
    // Run one round trip so the dispose is guaranteed dispatched.
    let sync = {
        let connection = Arc::clone(&connection);
        tokio::spawn(async move {
            connection
                .send_call("playwright", "ping", json!({}), None)
                .await
        })
    };
    let call = driver.recv().await;
    driver.reply(call["id"].as_u64().unwrap(), json!({})).await;
    sync.await.unwrap().unwrap();

    assert_eq!(context.pages().len(), 1);
}

#[tokio::test]
async fn one_event_resolves_every_waiter() {
    let (_connection, mut driver) = connect();
    let session = handshake(&_connection, &mut driver).await;
    let (_browser, context, _page) = launch_page(&session, &mut driver).await;

    let first = {
        let context = context.clone();
        tokio::spawn(async move { context.wait_for_event("close").await })
    };
    let second = {
        let context = context.clone();
        tokio::spawn(async move { context.wait_for_event("close").await })
    };
    // Give both waiters time to register before the event fires.
    tokio::time::sleep(Duration::from_millis(20)).await;

    driver
        .event("browser-context@1", "close", json!({"reason": "done"}))
        .await;

    assert_eq!(first.await.unwrap().unwrap()["reason"], "done");
    assert_eq!(second.await.unwrap().unwrap()["reason"], "done");
}

#[tokio::test]
async fn waiting_for_an_event_that_never_fires_times_out() {
    let (_connection, mut driver) = connect();
    let session = handshake(&_connection, &mut driver).await;
    let (_browser, context, _page) = launch_page(&session, &mut driver).await;

    let outcome = context
        .wait_for_event_with("close", None, Duration::from_millis(20))
        .await;
    assert!(matches!(outcome, Err(Error::Timeout(_))));
}

#[tokio::test]
async fn disposal_fails_pending_waiters() {
    let (_connection, mut driver) = connect();
    let session = handshake(&_connection, &mut driver).await;
    let (_browser, _context, page) = launch_page(&session, &mut driver).await;

    let waiting = {
        let page = page.clone();
        tokio::spawn(async move { page.wait_for_event("download").await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;

    driver.dispose("page@1").await;

    match waiting.await.unwrap() {
        Err(e) if e.is_target_closed() => {}
        other => panic!("expected target-closed, got {:?}", other.map(|_| ())),
    }
}

#[tokio::test]
async fn frame_navigation_updates_url_and_surfaces_on_the_page() {
    let (_connection, mut driver) = connect();
    let session = handshake(&_connection, &mut driver).await;
    let (_browser, _context, page) = launch_page(&session, &mut driver).await;

    let navigated = {
        let page = page.clone();
        tokio::spawn(async move { page.wait_for_event("frameNavigated").await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;

    driver
        .event(
            "frame@1",
            "navigated",
            json!({"url": "https://example.com/", "name": ""}),
        )
        .await;

    let params = navigated.await.unwrap().unwrap();
    assert_eq!(params["url"], "https://example.com/");
    assert_eq!(page.url().unwrap(), "https://example.com/");
}

#[tokio::test]
async fn selector_registration_is_refused_once_a_context_exists() {
    let (_connection, mut driver) = connect();
    let session = handshake(&_connection, &mut driver).await;
    let selectors = session.selectors().unwrap();

    // Before any context, registration goes through to the driver.
    let client = {
        let selectors = selectors.clone();
        tokio::spawn(async move { selectors.register("foo", "({query: () => null})").await })
    };
    let call = driver.recv().await;
    assert_eq!(call["method"], "register");
    assert_eq!(call["guid"], "selectors");
    assert_eq!(call["params"]["name"], "foo");
    driver.reply(call["id"].as_u64().unwrap(), json!({})).await;
    client.await.unwrap().unwrap();

    let (_browser, _context, _page) = launch_page(&session, &mut driver).await;

    let refused = selectors.register("bar", "({query: () => null})").await;
    assert!(matches!(refused, Err(Error::Validation(_))));
}

#[tokio::test]
async fn page_operations_round_trip_through_the_main_frame() {
    let (_connection, mut driver) = connect();
    let session = handshake(&_connection, &mut driver).await;
    let (_browser, _context, page) = launch_page(&session, &mut driver).await;

    let client = {
        let page = page.clone();
        tokio::spawn(async move { page.title().await })
    };
    let call = driver.recv().await;
    assert_eq!(call["method"], "title");
    assert_eq!(call["guid"], "frame@1");
    driver
        .reply(call["id"].as_u64().unwrap(), json!({"value": "Example Domain"}))
        .await;
    assert_eq!(client.await.unwrap().unwrap(), "Example Domain");

    let client = {
        let page = page.clone();
        tokio::spawn(async move { page.evaluate("() => 6 * 7", Value::Null).await })
    };
    let call = driver.recv().await;
    assert_eq!(call["method"], "evaluateExpression");
    assert_eq!(call["params"]["arg"]["value"], json!({"v": "undefined"}));
    driver
        .reply(call["id"].as_u64().unwrap(), json!({"value": {"n": 42}}))
        .await;
    assert_eq!(client.await.unwrap().unwrap(), json!(42));

    let client = {
        let page = page.clone();
        tokio::spawn(async move { page.fill("#name", "ada").await })
    };
    let call = driver.recv().await;
    assert_eq!(call["method"], "fill");
    assert_eq!(call["params"]["selector"], "#name");
    assert_eq!(call["params"]["value"], "ada");
    assert_eq!(call["params"]["strict"], true);
    driver.reply(call["id"].as_u64().unwrap(), json!({})).await;
    client.await.unwrap().unwrap();
}

#[tokio::test]
async fn element_properties_resolve_as_js_handles() {
    let (_connection, mut driver) = connect();
    let session = handshake(&_connection, &mut driver).await;
    let (_browser, _context, page) = launch_page(&session, &mut driver).await;

    let client = {
        let page = page.clone();
        tokio::spawn(async move { page.query_selector("#form").await })
    };
    let call = driver.recv().await;
    assert_eq!(call["method"], "querySelector");
    assert_eq!(call["guid"], "frame@1");
    driver
        .create("frame@1", "ElementHandle", "element@1", json!({"preview": "JSHandle@node"}))
        .await;
    driver
        .reply(
            call["id"].as_u64().unwrap(),
            json!({"element": {"guid": "element@1"}}),
        )
        .await;
    let element = client.await.unwrap().unwrap().unwrap();

    let client = {
        let element = element.clone();
        tokio::spawn(async move { element.get_property("value").await })
    };
    let call = driver.recv().await;
    assert_eq!(call["method"], "getProperty");
    assert_eq!(call["guid"], "element@1");
    assert_eq!(call["params"]["name"], "value");
    driver
        .create("element@1", "JSHandle", "handle@1", json!({"preview": "ada"}))
        .await;
    driver
        .reply(
            call["id"].as_u64().unwrap(),
            json!({"handle": {"guid": "handle@1"}}),
        )
        .await;
    let property = client.await.unwrap().unwrap();

    let client = tokio::spawn(async move { property.json_value().await });
    let call = driver.recv().await;
    assert_eq!(call["method"], "jsonValue");
    assert_eq!(call["guid"], "handle@1");
    driver
        .reply(call["id"].as_u64().unwrap(), json!({"value": {"s": "ada"}}))
        .await;
    assert_eq!(client.await.unwrap().unwrap(), json!("ada"));
}

#[tokio::test]
async fn driver_errors_surface_with_their_payload() {
    let (_connection, mut driver) = connect();
    let session = handshake(&_connection, &mut driver).await;

    let browser_type = session.chromium().unwrap();
    let client = tokio::spawn(async move { browser_type.launch().await });
    let call = driver.recv().await;
    driver
        .send(json!({
            "id": call["id"],
            "error": {"error": {
                "name": "Error",
                "message": "Executable doesn't exist at /opt/chromium/bin",
                "stack": "Error: ...",
            }},
        }))
        .await;

    match client.await.unwrap() {
        Err(Error::BrowserNotInstalled { name, .. }) => assert_eq!(name, "chromium"),
        other => panic!("expected BrowserNotInstalled, got {:?}", other.map(|_| ())),
    }
}

#[tokio::test]
async fn close_rejects_pending_work_and_disposes_proxies() {
    let (connection, mut driver) = connect();
    let session = handshake(&connection, &mut driver).await;
    let (_browser, context, page) = launch_page(&session, &mut driver).await;

    let pending = {
        let page = page.clone();
        tokio::spawn(async move { page.content().await })
    };
    driver.recv().await;

    connection.close().await;

    match pending.await.unwrap() {
        Err(e) if e.is_target_closed() => {}
        other => panic!("expected target-closed, got {:?}", other.map(|_| ())),
    }
    assert!(page.is_closed());
    assert!(context.close().await.is_ok());
    assert!(connection.is_closed());

    // Closing again is a no-op.
    connection.close().await;
}
