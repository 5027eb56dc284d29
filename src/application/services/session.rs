use crate::domain::entities::AuthSession;
use tokio::sync::watch;

/// セッションの書き込み側。`AuthService` だけが保持する。
#[derive(Debug)]
pub struct SessionWriter {
    sender: watch::Sender<AuthSession>,
}

/// セッションの読み取り側。画面・ルートガードに配る。
#[derive(Debug, Clone)]
pub struct SessionReader {
    receiver: watch::Receiver<AuthSession>,
}

pub fn session_channel() -> (SessionWriter, SessionReader) {
    let (sender, receiver) = watch::channel(AuthSession::signed_out());
    (SessionWriter { sender }, SessionReader { receiver })
}

impl SessionWriter {
    pub fn publish(&self, session: AuthSession) {
        self.sender.send_replace(session);
    }

    pub fn reader(&self) -> SessionReader {
        SessionReader {
            receiver: self.sender.subscribe(),
        }
    }
}

impl SessionReader {
    pub fn current(&self) -> AuthSession {
        self.receiver.borrow().clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.receiver.borrow().is_authenticated
    }

    /// 変更通知を受け取る
    pub fn subscribe(&self) -> watch::Receiver<AuthSession> {
        self.receiver.clone()
    }
}
