//! TCN (Terse Chess Notation) decoder for Chess.com move lists.
//! TCN is a compact 2-char-per-move encoding.

use shakmaty::san::SanPlus;
use shakmaty::uci::UciMove;
use shakmaty::{Chess, File, Rank, Role, Square};

use crate::NotationError;

const TCN_CHARS: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789!?{~}(^)[_]@#$,./&-*++=";

const PROMO_ROLES: [Role; 4] = [Role::Queen, Role::Knight, Role::Rook, Role::Bishop];

fn char_to_idx(c: u8) -> Option<usize> {
    TCN_CHARS.iter().position(|&x| x == c)
}

fn square_at(idx: usize) -> Square {
    Square::from_coords(File::new((idx % 8) as u32), Rank::new((idx / 8) as u32))
}

/// Decode one TCN pair into a UCI move. Index 64 and above on the
/// destination encodes a promotion: piece in `/ 3`, file offset in `% 3`.
fn decode_pair(a: u8, b: u8) -> Option<UciMove> {
    let from_idx = char_to_idx(a).filter(|i| *i < 64)?;
    let to_idx = char_to_idx(b)?;
    let from = square_at(from_idx);

    if to_idx < 64 {
        return Some(UciMove::Normal {
            from,
            to: square_at(to_idx),
            promotion: None,
        });
    }

    let promo_value = to_idx - 64;
    let role = *PROMO_ROLES.get(promo_value / 3)?;
    let to_file = (from_idx % 8) as i32 + (promo_value % 3) as i32 - 1;
    if !(0..8).contains(&to_file) {
        return None;
    }
    let to_rank = if from_idx / 8 == 6 { 7 } else { 0 };

    Some(UciMove::Normal {
        from,
        to: Square::from_coords(File::new(to_file as u32), Rank::new(to_rank)),
        promotion: Some(role),
    })
}

/// Decode a TCN string into SAN moves (with check suffixes), replayed from
/// the initial position. Fails on the first undecodable or illegal pair.
pub fn decode_tcn_to_san(tcn: &str) -> Result<Vec<String>, NotationError> {
    let bytes = tcn.trim().as_bytes();
    if bytes.len() % 2 != 0 {
        return Err(NotationError::Unparseable(format!(
            "TCN has odd length {}",
            bytes.len()
        )));
    }

    let mut pos = Chess::default();
    let mut san_moves = Vec::with_capacity(bytes.len() / 2);

    for (ply, pair) in bytes.chunks_exact(2).enumerate() {
        let uci = decode_pair(pair[0], pair[1]).ok_or_else(|| {
            NotationError::Unparseable(format!(
                "TCN pair {:?} at ply {ply}",
                String::from_utf8_lossy(pair)
            ))
        })?;
        let mv = uci
            .to_move(&pos)
            .map_err(|e| NotationError::Illegal(format!("{uci} at ply {ply}: {e}")))?;
        san_moves.push(SanPlus::from_move_and_play_unchecked(&mut pos, mv).to_string());
    }

    Ok(san_moves)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_tcn_opening() {
        // e2 = idx 12 ('m'), e4 = idx 28 ('C'), e7 = idx 52 ('0'), e5 = idx 36 ('K')
        let san = decode_tcn_to_san("mC0K").unwrap();
        assert_eq!(san, vec!["e4", "e5"]);
    }

    #[test]
    fn test_decode_tcn_castling_and_check() {
        // e4 e5 Nf3 Nc6 Bc4 Nf6 O-O
        // g1=6 'g' f3=21 'v', b8=57 '5' c6=42 'Q', f1=5 'f' c4=26 'A', g8=62 '!' f6=45 'T', e1=4 'e' g1=6 'g'
        let san = decode_tcn_to_san("mC0Kgv5QfA!Teg").unwrap();
        assert_eq!(san.last().map(String::as_str), Some("O-O"));
        assert_eq!(san.len(), 7);
    }

    #[test]
    fn test_decode_tcn_rejects_illegal_pair() {
        // e2 -> e5 is not a legal pawn move
        let err = decode_tcn_to_san("mK").unwrap_err();
        assert!(matches!(err, NotationError::Illegal(_)));
    }

    #[test]
    fn test_decode_tcn_rejects_odd_length() {
        assert!(decode_tcn_to_san("mCm").is_err());
    }
}
