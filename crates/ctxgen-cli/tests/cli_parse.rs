use std::fs;
use std::path::PathBuf;

use clap::Parser;
use ctxgen_cli::commands::{CurrentEventArg, ScopeArg};
use ctxgen_cli::{Cli, Commands};
use ctxgen_data::movielens::DatasetVariant;
use tempfile::tempdir;

#[test]
fn cli_parses_generate_flags() {
    let cli = Cli::parse_from([
        "ctxgen",
        "generate",
        "--data-dir",
        "/data/ml-25m",
        "--dataset",
        "25M",
        "--output-dir",
        "/out",
        "--shard-width",
        "500000",
        "--seed",
        "7",
        "--current-event",
        "include",
        "--scope",
        "prior",
        "-w",
        "4",
    ]);
    assert!(!cli.verbose);
    let Commands::Generate(cmd) = cli.command else {
        panic!("expected generate");
    };
    assert_eq!(cmd.dataset, DatasetVariant::Ml25M);
    assert_eq!(cmd.data_dir, PathBuf::from("/data/ml-25m"));
    assert_eq!(cmd.shard_width, Some(500_000));
    assert_eq!(cmd.seed, Some(7));
    assert_eq!(cmd.current_event, Some(CurrentEventArg::Include));
    assert_eq!(cmd.scope, Some(ScopeArg::Prior));
    assert_eq!(cmd.workers, Some(4));
    assert_eq!(cmd.feature_length, None);
    assert!(!cmd.real_occupation);
}

#[test]
fn cli_parses_inspect_with_real_occupation() {
    let cli = Cli::parse_from([
        "ctxgen",
        "inspect",
        "--data-dir",
        "/data/ml-1m",
        "--real-occupation",
        "--head",
        "3",
    ]);
    let Commands::Inspect(cmd) = cli.command else {
        panic!("expected inspect");
    };
    assert!(cmd.real_occupation);
    assert_eq!(cmd.dataset, DatasetVariant::Ml1M);
    assert_eq!(cmd.head, 3);
}

#[test]
fn cli_rejects_unknown_dataset() {
    let result = Cli::try_parse_from([
        "ctxgen",
        "generate",
        "--data-dir",
        "/data",
        "--dataset",
        "100K",
        "--output-dir",
        "/out",
    ]);
    assert!(result.is_err());
}

#[test]
fn cli_parses_verify_with_global_verbose() {
    let cli = Cli::parse_from(["ctxgen", "verify", "--output-dir", "/out", "--dataset", "1M", "-v"]);
    assert!(cli.verbose);
    let Commands::Verify(cmd) = cli.command else {
        panic!("expected verify");
    };
    assert_eq!(cmd.dataset, Some(DatasetVariant::Ml1M));
    assert_eq!(cmd.threshold, 4.0);
}

#[test]
fn generate_then_verify_movielens_10m() {
    let data = tempdir().unwrap();
    fs::write(
        data.path().join("ratings.dat"),
        "1::10::4.5::1\n1::11::2.5::2\n2::10::3.0::3\n2::11::5.0::4\n3::10::4.0::5\n",
    )
    .unwrap();
    fs::write(
        data.path().join("movies.dat"),
        "10::Heat (1995)::Action\n11::Sabrina (1995)::Comedy\n",
    )
    .unwrap();
    let out = tempdir().unwrap();
    let data_dir = data.path().to_string_lossy().into_owned();
    let out_dir = out.path().to_string_lossy().into_owned();

    let cli = Cli::parse_from([
        "ctxgen",
        "generate",
        "--data-dir",
        &data_dir,
        "--dataset",
        "10M",
        "--output-dir",
        &out_dir,
        "--shard-width",
        "2",
        "--seed",
        "1",
    ]);
    let Commands::Generate(cmd) = cli.command else {
        panic!("expected generate");
    };
    cmd.run().unwrap();
    assert!(out
        .path()
        .join("movie_lens_10M_context_features_2.npz")
        .exists());

    let cli = Cli::parse_from(["ctxgen", "verify", "--output-dir", &out_dir, "--dataset", "10M"]);
    let Commands::Verify(cmd) = cli.command else {
        panic!("expected verify");
    };
    cmd.run().unwrap();

    let cli = Cli::parse_from(["ctxgen", "verify", "--output-dir", &out_dir, "--prefix", "other"]);
    let Commands::Verify(cmd) = cli.command else {
        panic!("expected verify");
    };
    assert!(cmd.run().is_err());
}
