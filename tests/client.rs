mod common;

use common::{MockResponse, MockServer};
use devicedb::{
    BatchOp, BucketName, DeviceDbClient, DeviceDbError, Event, HistoryQuery, KvBucket, MatchRecord,
    PurgeQuery, Result,
};
use serde_json::json;

fn client(server: &MockServer) -> DeviceDbClient {
    DeviceDbClient::connect(&server.uri()).unwrap()
}

#[test]
fn put_sends_a_single_op_batch() {
    let server = MockServer::ok("");
    client(&server).put("k", "v", None).unwrap();

    let request = server.single_request();
    assert_eq!(request.method, "POST");
    assert_eq!(request.path(), "/default/batch");
    assert_eq!(request.json(), json!([{"type": "put", "key": "k", "value": "v", "context": ""}]));
}

#[test]
fn delete_on_another_bucket_carries_context() {
    let server = MockServer::ok("");
    client(&server).bucket(BucketName::Lww).delete("k", Some("ctx")).unwrap();

    let request = server.single_request();
    assert_eq!(request.path(), "/lww/batch");
    assert_eq!(request.json(), json!([{"type": "delete", "key": "k", "context": "ctx"}]));
}

#[test]
fn batch_sends_every_op() {
    let server = MockServer::ok("");
    let ops = vec![BatchOp::put("a", "1", None), BatchOp::delete("b", Some("c"))];
    client(&server).cloud().batch(&ops).unwrap();

    let request = server.single_request();
    assert_eq!(request.path(), "/cloud/batch");
    assert_eq!(request.json().as_array().unwrap().len(), 2);
}

#[test]
fn get_resolves_siblings() {
    let server = MockServer::ok(r#"[{"siblings":["v"],"context":"c"}]"#);
    let object = client(&server).get("k").unwrap().unwrap();

    assert_eq!(object.value.as_deref(), Some("v"));
    assert_eq!(object.context, "c");
    let request = server.single_request();
    assert_eq!(request.method, "POST");
    assert_eq!(request.path(), "/default/values");
    assert_eq!(request.json(), json!(["k"]));
}

#[test]
fn get_many_keeps_order_and_missing_keys() {
    let server = MockServer::ok(
        r#"[{"siblings":["a","b"],"context":"c1"},null,{"siblings":[],"context":"c3"}]"#,
    );
    let objects = client(&server).local().get_many(&["k1", "k2", "k3"]).unwrap();

    assert_eq!(objects.len(), 3);
    let conflict = objects[0].as_ref().unwrap();
    assert_eq!(conflict.siblings.len(), 2);
    assert_eq!(conflict.value, None);
    assert!(objects[1].is_none());
    assert_eq!(objects[2].as_ref().unwrap().value, None);
    assert_eq!(server.single_request().path(), "/local/values");
}

#[test]
fn get_of_a_missing_key_is_none() {
    let server = MockServer::ok("[null]");
    assert!(client(&server).get("nothing").unwrap().is_none());
}

#[test]
fn matches_are_streamed_to_the_callback() {
    let server = MockServer::ok(
        "p\np1\n{\"siblings\":[\"v\"],\"context\":\"c\"}\n\
         p\np2\n{\"siblings\":[\"x\",\"y\"],\"context\":\"d\"}\n",
    );
    let mut records: Vec<Result<MatchRecord>> = Vec::new();
    let delivered = client(&server).get_matches("p", |r| records.push(r)).unwrap();

    assert_eq!(delivered, 2);
    let first = records[0].as_ref().unwrap();
    assert_eq!(first.prefix, "p");
    assert_eq!(first.key, "p1");
    assert_eq!(first.value.as_deref(), Some("v"));
    assert_eq!(records[1].as_ref().unwrap().value, None);

    let request = server.single_request();
    assert_eq!(request.path(), "/default/matches");
    assert_eq!(request.json(), json!(["p"]));
}

#[test]
fn malformed_match_stream_reports_to_the_callback() {
    let server = MockServer::ok("p\nk\n{\"siblings\":\"nope\"}\n");
    let mut records: Vec<Result<MatchRecord>> = Vec::new();
    let delivered = client(&server).get_matches("p", |r| records.push(r)).unwrap();

    assert_eq!(delivered, 0);
    assert_eq!(records.len(), 1);
    assert!(matches!(records[0], Err(DeviceDbError::Stream(_))));
}

#[test]
fn merkle_root_is_read_from_the_bucket() {
    let server = MockServer::ok(r#"{"hash":{"high":1,"low":2}}"#);
    let root = client(&server).merkle_root().unwrap();

    assert_eq!(root["hash"]["low"], 2);
    let request = server.single_request();
    assert_eq!(request.method, "GET");
    assert_eq!(request.path(), "/default/merkleRoot");
}

#[test]
fn add_peer_sends_host_and_port() {
    let server = MockServer::ok("");
    let client = client(&server);
    client.add_peer("peer1", "https://10.0.0.2:9090").unwrap();
    client.add_peer("peer2", "https://devicedb.local").unwrap();

    let requests = server.requests();
    assert_eq!(requests[0].method, "PUT");
    assert_eq!(requests[0].path(), "/peers/peer1");
    assert_eq!(requests[0].json(), json!({"id": "peer1", "host": "10.0.0.2", "port": 9090}));
    assert_eq!(requests[1].json()["port"], 443);
}

#[test]
fn remove_and_list_peers() {
    let server = MockServer::start(|request| match request.method.as_str() {
        "GET" => MockResponse::ok(r#"[{"id":"peer1","host":"h","port":1},{"id":"peer2"}]"#),
        _ => MockResponse::ok(""),
    });
    let client = client(&server);
    client.remove_peer("peer1").unwrap();
    let peers = client.list_peers().unwrap();

    assert_eq!(peers.len(), 2);
    assert_eq!(peers[0].port, Some(1));
    assert_eq!(peers[1].host, None);
    let requests = server.requests();
    assert_eq!(requests[0].method, "DELETE");
    assert_eq!(requests[0].path(), "/peers/peer1");
    assert_eq!(requests[1].path(), "/peers");
}

#[test]
fn log_puts_the_event_data() {
    let server = MockServer::ok("");
    let event = Event::new("sensor", "reading", json!({"t": 21})).with_groups(["g1", "g2"]);
    client(&server).history().log(&event).unwrap();

    let request = server.single_request();
    assert_eq!(request.method, "PUT");
    assert_eq!(request.path(), "/events/sensor/reading");
    assert_eq!(request.query(), Some("category=events&group=g1&group=g2"));
    assert_eq!(request.json(), json!({"t": 21}));
}

#[test]
fn query_streams_events() {
    let server = MockServer::ok(
        "{\"source\":\"a\",\"type\":\"t\",\"data\":\"1\",\"groups\":[]}\n\n\
         {\"source\":\"b\",\"type\":\"t\",\"data\":\"2\",\"groups\":[\"g\"]}\n",
    );
    let query = HistoryQuery {
        sources: vec!["a".into(), "b".into()],
        limit: Some(5),
        ..Default::default()
    };
    let mut events = Vec::new();
    let delivered = client(&server).history().query(&query, |r| events.push(r.unwrap())).unwrap();

    assert_eq!(delivered, 2);
    assert_eq!(events[1].source, "b");
    assert_eq!(events[1].groups, vec!["g"]);
    let request = server.single_request();
    assert_eq!(request.method, "GET");
    assert_eq!(request.path(), "/events");
    assert_eq!(request.query(), Some("source=a&source=b&limit=5"));
}

#[test]
fn query_without_filters_sends_no_query_string() {
    let server = MockServer::ok("");
    let delivered = client(&server).history().query(&HistoryQuery::default(), |_| {}).unwrap();

    assert_eq!(delivered, 0);
    assert_eq!(server.single_request().query(), None);
}

#[test]
fn purge_sends_the_time_window() {
    let server = MockServer::ok("");
    let query = PurgeQuery { max_age: Some(1000), before_time: Some(5), ..Default::default() };
    client(&server).history().purge(&query).unwrap();

    let request = server.single_request();
    assert_eq!(request.method, "DELETE");
    assert_eq!(request.target, "/events?maxAge=1000&beforeTime=5");
}

#[test]
fn alerts_are_logged_in_their_own_category() {
    let server = MockServer::ok("");
    let client = client(&server);
    client.alerts().raise_alert("fire", "critical", json!({"room": 4})).unwrap();
    client.alerts().lower_alert("fire", "critical", json!(null)).unwrap();

    let requests = server.requests();
    assert_eq!(requests[0].path(), "/events/fire/critical");
    assert_eq!(requests[0].query(), Some("category=alerts"));
    assert_eq!(requests[0].json(), json!({"status": true, "metadata": {"room": 4}}));
    assert_eq!(requests[1].json(), json!({"status": false, "metadata": null}));
}

#[test]
fn invalid_alerts_never_reach_the_server() {
    let server = MockServer::ok("");
    let client = client(&server);

    assert!(matches!(
        client.alerts().raise_alert("", "critical", json!(null)),
        Err(DeviceDbError::Validation(_))
    ));
    assert!(matches!(
        client.alerts().lower_alert("  ", "critical", json!(null)),
        Err(DeviceDbError::Validation(_))
    ));
    assert!(matches!(
        client.history().log(&Event::new("", "t", json!(null))),
        Err(DeviceDbError::Validation(_))
    ));
    assert!(server.requests().is_empty());
}

#[test]
fn non_200_carries_the_response_body() {
    let server = MockServer::start(|_| MockResponse::status(500, r#"{"message":"boom"}"#));
    let client = client(&server);

    let err = client.put("k", "v", None).unwrap_err();
    assert_eq!(err.status(), Some(500));
    assert_eq!(err.body_json().unwrap()["message"], "boom");

    let err = client.history().query(&HistoryQuery::default(), |_| {}).unwrap_err();
    assert!(matches!(err, DeviceDbError::Protocol { status: 500, .. }));

    let err = client.get_matches("p", |_| {}).unwrap_err();
    assert!(matches!(err, DeviceDbError::Protocol { status: 500, .. }));
}

#[test]
fn unreadable_error_body_is_reported_in_the_error() {
    let server = MockServer::start(|_| MockResponse::truncated(503, "partial"));
    let err = client(&server).put("k", "v", None).unwrap_err();

    match err {
        DeviceDbError::Protocol { status, body } => {
            assert_eq!(status, 503);
            assert!(body.starts_with("<unreadable response body"), "{}", body);
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[test]
fn other_success_codes_are_still_errors() {
    let server = MockServer::start(|_| MockResponse::status(204, ""));
    let err = client(&server).remove_peer("p").unwrap_err();
    assert_eq!(err.status(), Some(204));
}

#[test]
fn unreachable_server_is_a_transport_error() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let uri = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);

    let err = DeviceDbClient::connect(&uri).unwrap().get("k").unwrap_err();
    assert!(matches!(err, DeviceDbError::Transport(_)));
}
