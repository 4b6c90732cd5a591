//! エンジンの共有状態

use engine_core::position::Position;
use engine_core::search::Searcher;

/// プロトコルハンドラが操作するエンジン状態
pub struct EngineState {
    pub searcher: Searcher,
    pub pos: Position,
    pub key_history: Vec<u64>,
}

impl EngineState {
    pub fn new(searcher: Searcher) -> EngineState {
        EngineState {
            searcher,
            pos: Position::startpos(),
            key_history: Vec::new(),
        }
    }
}
