use std::fs;

use sokoban_core::{
    Direction,
    board::Action,
    environment::{SokobanConfig, SokobanEnv},
    room::Room,
    search::SearchState,
    solve_log::SolveLog,
    solver::solve_room,
};
use tempfile::TempDir;

const TWO_BOXES: &str = "\
##########
#        #
#  @$.   #
#        #
#        #
#   $    #
#   .    #
#        #
#        #
##########
";

#[test]
fn plan_drives_the_environment_to_completion() {
    let dir = TempDir::new().unwrap();
    let file = dir.path().join("000.txt");
    fs::write(&file, format!("; 0\n{TWO_BOXES}")).unwrap();

    let config = SokobanConfig {
        levels_dir: file,
        load_sequentially: true,
        n_levels_to_load: Some(1),
        ..SokobanConfig::default()
    };
    let mut env = SokobanEnv::new(config).unwrap();
    let outcome = solve_room(env.board().room(), 100_000).unwrap();
    assert!(outcome.is_solved());
    assert!(outcome.consistent);

    let (last, rest) = outcome.actions.split_last().unwrap();
    let mut total = 0.0;
    for d in rest {
        let result = env.step(Action::Push(*d)).unwrap();
        assert!(!result.terminated && !result.truncated);
        total += result.reward;
    }
    let result = env.step(Action::Push(*last)).unwrap();
    assert!(result.terminated);
    total += result.reward;

    let steps = outcome.actions.len() as f32;
    let expected = steps * -0.1 + 2.0 + 10.0;
    assert!((total - expected).abs() < 1e-3, "{total} != {expected}");
}

#[test]
fn resumed_run_skips_logged_levels() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("log.csv");
    let rooms: Vec<Room> = [
        "#####\n#@$.#\n#   #\n#   #\n#####",
        "#####\n#@$ #\n#  .#\n# . #\n#####",
    ]
    .iter()
    .map(|t| t.parse().unwrap())
    .collect();

    let (mut log, done) = SolveLog::open(&path).unwrap();
    assert_eq!(done, 0);
    let first = solve_room(&rooms[0], 1000).unwrap();
    assert_eq!(first.actions, [Direction::Right]);
    log.write(0, &first).unwrap();
    drop(log);

    let (mut log, done) = SolveLog::open(&path).unwrap();
    assert_eq!(done, 1);
    let second = solve_room(&rooms[done], 1000).unwrap();
    assert_eq!(second.state, SearchState::Invalid);
    log.write(done, &second).unwrap();

    let text = fs::read_to_string(&path).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines[0], "Level, Actions, Steps, SearchSteps");
    assert_eq!(lines[1], format!("0, 3, 1, {}", first.search_steps));
    assert_eq!(lines[2], "1, SEARCH_STATE_INVALID, -1, 1");
}
