use crate::game::GameState;

/// 画面上部のバナー文字列
///
/// Hershey フォントはASCIIしか描けないので、それ以外は落とす。
pub fn banner_text(state: &GameState) -> String {
    let text = format!("REPS: {}  XP: {}  {}", state.rep_count, state.score, state.feedback);
    text.chars()
        .map(|c| if c == '—' { '-' } else { c })
        .filter(|c| c.is_ascii())
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}
