//! End-to-end tests: a whole session against a scripted server

mod common;

use common::{describe_reply, test_config, ScriptedTransport, ServerScript};
use firebird_wire::constants::{sql_info, sql_type, Opcode};
use firebird_wire::{
    Attachment, AttachmentState, Error, FreeOption, StatementState, TransactionParameters, TransactionState,
};

const LONG: i32 = sql_type::LONG + 1;
const VARYING: i32 = sql_type::VARYING + 1;

mod handshake_tests {
    use super::*;

    #[tokio::test]
    async fn test_reject_fails_attach() {
        let (transport, sent) = ScriptedTransport::new(ServerScript::new().op(Opcode::Reject));
        let err = Attachment::attach_with_transport(Box::new(transport), &test_config())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ConnectionRejected(4)));
        assert_eq!(sent.words_since(0)[0], Opcode::Connect.code());
    }

    #[tokio::test]
    async fn test_dummy_before_accept() {
        let script = ServerScript::new().dummy().accept().attached(7);
        let (transport, _) = ScriptedTransport::new(script);
        let db = Attachment::attach_with_transport(Box::new(transport), &test_config())
            .await
            .unwrap();
        assert_eq!(db.object_id().await, 7);
        assert_eq!(db.state().await, AttachmentState::Attached);
        assert_eq!(db.server_info().await.protocol_version, 10);
    }

    #[tokio::test]
    async fn test_non_utf8_charset_refused_before_connect() {
        let (transport, sent) = ScriptedTransport::new(ServerScript::new().accept().attached(1));
        let config = test_config().charset("WIN1252");
        let err = Attachment::attach_with_transport(Box::new(transport), &config)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::UnsupportedCharset(_)));
        assert_eq!(sent.len(), 0);

        let (transport, _) = ScriptedTransport::new(ServerScript::new().accept().attached(1));
        let config = test_config().charset("UTF8");
        let db = Attachment::attach_with_transport(Box::new(transport), &config)
            .await
            .unwrap();
        assert!(db.is_attached().await);
    }

    #[tokio::test]
    async fn test_attach_error_leaves_no_attachment() {
        let script = ServerScript::new().accept().error(335544344);
        let (transport, _) = ScriptedTransport::new(script);
        let err = Attachment::attach_with_transport(Box::new(transport), &test_config())
            .await
            .unwrap_err();
        assert_eq!(err.gds_code(), Some(335544344));
    }
}

mod session_tests {
    use super::*;

    #[tokio::test]
    async fn test_select_fetch_close_commit() {
        let reply = describe_reply(sql_info::SELECT, &[(LONG, 4, "A"), (VARYING, 10, "B")]);
        let script = ServerScript::new()
            .ok(3) // start
            .ok(5) // allocate
            .response(0, 0, &reply) // prepare
            .ok(0) // execute
            .fetch_header(0, 1)
            .fixed(&[0, 0, 0, 1])
            .varying(b"one")
            .fetch_header(0, 1)
            .fixed(&[0, 0, 0, 2])
            .varying(b"two")
            .fetch_header(0, 0)
            .fetch_header(0, 1)
            .fixed(&[0, 0, 0, 3])
            .varying(b"three")
            .fetch_header(100, 0)
            .ok(0) // close
            .ok(0); // commit
        let (db, sent) = common::attach(script).await;

        let mut tx = db.start_transaction(&TransactionParameters::default()).await.unwrap();
        let mut stmt = db.allocate_statement().await.unwrap();
        stmt.prepare(&tx, "SELECT A, B FROM T", 3).await.unwrap();
        let output = stmt.output().unwrap();
        assert_eq!(output.len(), 2);
        assert_eq!(output.column(1).unwrap().name(), "B");

        let mark = sent.len();
        stmt.execute(&tx, &[]).await.unwrap();
        assert_eq!(sent.words_since(mark)[0], 63);
        assert_eq!(stmt.state(), StatementState::CursorOpen);

        let mark = sent.len();
        assert_eq!(stmt.fetch(10).await.unwrap(), 2);
        assert!(!stmt.all_rows_fetched());
        let words = sent.words_since(mark);
        assert_eq!(&words[..2], &[65, 5]);
        assert_eq!(*words.last().unwrap(), 10);

        let first = stmt.next_row().unwrap();
        assert_eq!(first.get(0), Some(&[0u8, 0, 0, 1][..]));
        assert_eq!(first.get(1), Some(&b"one"[..]));

        assert_eq!(stmt.fetch(10).await.unwrap(), 1);
        assert!(stmt.all_rows_fetched());
        let rows = stmt.take_rows();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].get(1), Some(&b"three"[..]));

        let mark = sent.len();
        assert_eq!(stmt.fetch(10).await.unwrap(), 0);
        assert_eq!(sent.len(), mark);

        stmt.free(FreeOption::Close).await.unwrap();
        assert_eq!(sent.words_since(mark), vec![67, 5, 1]);
        assert_eq!(stmt.state(), StatementState::Prepared);

        tx.commit().await.unwrap();
        assert_eq!(tx.state(), TransactionState::None);
        assert!(db.is_attached().await);
    }

    #[tokio::test]
    async fn test_null_value_in_row() {
        let reply = describe_reply(sql_info::SELECT, &[(LONG, 4, "A")]);
        let script = ServerScript::new()
            .ok(3)
            .ok(5)
            .response(0, 0, &reply)
            .ok(0)
            .fetch_header(0, 1)
            .int(0)
            .int(-1)
            .fetch_header(100, 0);
        let (db, _) = common::attach(script).await;
        let tx = db.start_transaction(&TransactionParameters::default()).await.unwrap();
        let mut stmt = db.allocate_statement().await.unwrap();
        stmt.prepare(&tx, "SELECT A FROM T", 3).await.unwrap();
        stmt.execute(&tx, &[]).await.unwrap();

        assert_eq!(stmt.fetch(1).await.unwrap(), 1);
        let row = stmt.next_row().unwrap();
        assert!(row.is_null(0));
        assert_eq!(row.get(0), None);
    }

    #[tokio::test]
    async fn test_fetch_rejects_bad_batch_and_state() {
        let reply = describe_reply(sql_info::SELECT, &[(LONG, 4, "A")]);
        let script = ServerScript::new().ok(3).ok(5).response(0, 0, &reply);
        let (db, sent) = common::attach(script).await;
        let tx = db.start_transaction(&TransactionParameters::default()).await.unwrap();
        let mut stmt = db.allocate_statement().await.unwrap();
        stmt.prepare(&tx, "SELECT A FROM T", 3).await.unwrap();

        let mark = sent.len();
        assert!(matches!(stmt.fetch(0).await, Err(Error::InvalidFetchSize(0))));
        assert!(stmt.fetch(10).await.unwrap_err().is_state_violation());
        assert_eq!(sent.len(), mark);
    }

    #[tokio::test]
    async fn test_execute_immediate() {
        let script = ServerScript::new().ok(3).ok(0);
        let (db, sent) = common::attach(script).await;
        let tx = db.start_transaction(&TransactionParameters::default()).await.unwrap();

        let mark = sent.len();
        db.execute_immediate(&tx, "DELETE FROM T", 3).await.unwrap();
        let mut expected: Vec<u8> = [vec![0, 0, 0, 64], vec![0, 0, 0, 3], vec![0, 0, 0, 0], vec![0, 0, 0, 3]].concat();
        expected.extend_from_slice(&[0, 0, 0, 13]);
        expected.extend_from_slice(b"DELETE FROM T");
        expected.extend_from_slice(&[0, 0, 0]);
        expected.extend_from_slice(&[0, 0, 0, 0, 0, 0, 0, 0]);
        assert_eq!(sent.since(mark), expected);
    }

    #[tokio::test]
    async fn test_execute_immediate_requires_transaction() {
        let (db, sent) = common::attach(ServerScript::new()).await;
        let tx = db.transaction();
        let mark = sent.len();
        assert!(db
            .execute_immediate(&tx, "DELETE FROM T", 3)
            .await
            .unwrap_err()
            .is_state_violation());
        assert_eq!(sent.len(), mark);
    }

    #[tokio::test]
    async fn test_detach_sends_release() {
        let (db, sent) = common::attach(ServerScript::new().ok(0)).await;
        let mark = sent.len();
        db.detach().await.unwrap();
        assert_eq!(sent.words_since(mark), vec![21, 1]);
        assert!(!db.is_attached().await);
        assert!(matches!(db.allocate_statement().await, Err(Error::NotAttached)));
    }
}

mod tcp_tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_session_over_tcp() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let replies = ServerScript::new().accept().attached(1).ok(0).into_bytes();
            socket.write_all(&replies).await.unwrap();
            let mut received = Vec::new();
            socket.read_to_end(&mut received).await.unwrap();
            received
        });

        let mut config = test_config().port(port);
        config.host = "127.0.0.1".to_string();
        let db = Attachment::attach(&config).await.unwrap();
        assert!(db.is_attached().await);
        db.detach().await.unwrap();
        drop(db);

        let received = server.await.unwrap();
        assert_eq!(&received[..4], &Opcode::Connect.code().to_be_bytes());
    }
}
