//! CPI installer tests

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::{json, Map};

use vmboot::blobstore::LocalBlobstore;
use vmboot::cloud::Cloud;
use vmboot::cpi::{CpiInstaller, CpiInstallerDeps, Installer};
use vmboot::deployment::CpiDeploymentManifest;
use vmboot::filesys::dir::Dir;
use vmboot::filesys::file::File;
use vmboot::release::{Job, Release};
use vmboot::system::{Compressor, TarballCompressor};
use vmboot::templatescompiler::{FileTemplatesRepo, TemplatesCompiler};

use crate::fakes::{FakeCmdRunner, FakeJobRenderer, FakePackageCompiler, FakeReleaseReader};

struct Fixture {
    root: tempfile::TempDir,
    renderer: Arc<FakeJobRenderer>,
    package_compiler: Arc<FakePackageCompiler>,
    release_reader: Arc<FakeReleaseReader>,
    cmd_runner: Arc<FakeCmdRunner>,
    installer: CpiInstaller,
}

fn job(name: &str, templates: &[(&str, &str)]) -> Job {
    Job {
        name: name.to_string(),
        fingerprint: format!("{}-fingerprint", name),
        templates: templates
            .iter()
            .map(|(s, d)| (s.to_string(), d.to_string()))
            .collect::<BTreeMap<_, _>>(),
        ..Default::default()
    }
}

fn release(jobs: Vec<Job>) -> Release {
    Release {
        name: "fake-cpi-release".to_string(),
        version: "1".to_string(),
        jobs,
        ..Default::default()
    }
}

fn fixture(release: Release) -> Fixture {
    let root = tempfile::tempdir().unwrap();
    let tmp = Dir::new(root.path().join("tmp"));
    let compressor = Arc::new(TarballCompressor::new(tmp.path()));
    let blobstore = Arc::new(LocalBlobstore::new(Dir::new(root.path().join("blobs"))));
    let templates_repo = Arc::new(FileTemplatesRepo::new(File::new(
        root.path().join("templates.json"),
    )));
    let renderer = Arc::new(FakeJobRenderer::default());
    *renderer.contents.lock().unwrap() = Some("#!/bin/sh\necho '{}'\n".to_string());

    let templates_compiler = Arc::new(TemplatesCompiler::new(
        renderer.clone(),
        compressor.clone(),
        blobstore.clone(),
        templates_repo.clone(),
        tmp.clone(),
    ));
    let package_compiler = Arc::new(FakePackageCompiler::default());
    let release_reader = Arc::new(FakeReleaseReader::new(release));
    let cmd_runner = Arc::new(FakeCmdRunner::with_stdout(r#"{"result":"fake-stemcell-cid"}"#));

    let installer = CpiInstaller::new(
        CpiInstallerDeps {
            compressor,
            release_reader: release_reader.clone(),
            package_compiler: package_compiler.clone(),
            templates_compiler,
            templates_repo,
            blobstore,
            cmd_runner: cmd_runner.clone(),
        },
        tmp,
        Dir::new(root.path().join("cpi")),
        "fake-deployment-uuid".to_string(),
    );

    Fixture {
        root,
        renderer,
        package_compiler,
        release_reader,
        cmd_runner,
        installer,
    }
}

fn cpi_manifest() -> CpiDeploymentManifest {
    CpiDeploymentManifest {
        name: "fake-deployment-name".to_string(),
        properties: json!({"fake-key": "fake-value"})
            .as_object()
            .unwrap()
            .clone(),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_extract_unpacks_release() {
    let f = fixture(release(vec![]));
    let source = f.root.path().join("release-source");
    std::fs::create_dir_all(source.join("jobs")).unwrap();
    std::fs::write(source.join("release.MF"), "name: fake-cpi-release\n").unwrap();
    let tarball = TarballCompressor::new(f.root.path().join("build"))
        .compress_files_in_dir(&source)
        .await
        .unwrap();

    let extracted = f.installer.extract(&tarball).await.unwrap();

    assert_eq!(extracted.name, "fake-cpi-release");
    assert!(extracted.extracted_path.join("release.MF").is_file());
    assert_eq!(
        f.release_reader.inputs.lock().unwrap().clone(),
        vec![extracted.extracted_path.clone()]
    );

    extracted.delete().await.unwrap();
    assert!(!extracted.extracted_path.exists());
}

#[tokio::test]
async fn test_extract_failure_leaves_nothing_behind() {
    let f = fixture(release(vec![]));
    let missing = f.root.path().join("missing.tgz");

    let err = f.installer.extract(&missing).await.unwrap_err();

    assert!(err.to_string().contains("Extracting CPI release"));
    let tmp = f.root.path().join("tmp");
    assert!(std::fs::read_dir(&tmp).unwrap().next().is_none());
}

#[tokio::test]
async fn test_install_lays_out_cpi_job() {
    let rel = release(vec![
        job("fake-cpi", &[("cpi.erb", "/bin/cpi")]),
        job("fake-helper", &[("helper.erb", "bin/helper")]),
    ]);
    let f = fixture(rel.clone());

    let cloud = f.installer.install(&cpi_manifest(), &rel).await.unwrap();

    let jobs_dir = f.root.path().join("cpi/jobs");
    assert!(jobs_dir.join("fake-cpi/bin/cpi").is_file());
    assert!(jobs_dir.join("fake-helper/bin/helper").is_file());
    assert_eq!(
        f.package_compiler.compiled.lock().unwrap().clone(),
        vec![(
            "fake-cpi-release".to_string(),
            f.root.path().join("cpi/packages")
        )]
    );

    let inputs = f.renderer.inputs();
    assert_eq!(inputs.len(), 2);
    assert_eq!(inputs[0].deployment_name, "fake-deployment-name");
    assert_eq!(inputs[0].properties, cpi_manifest().properties);

    let cid = cloud
        .create_stemcell(std::path::Path::new("/fake/image"), &Map::new())
        .await
        .unwrap();
    assert_eq!(cid, "fake-stemcell-cid");

    let commands = f.cmd_runner.commands();
    assert_eq!(commands[0].name, jobs_dir.join("fake-cpi/bin/cpi"));
    assert_eq!(
        commands[0].env.get("BOSH_PACKAGES_DIR"),
        Some(&f.root.path().join("cpi/packages").display().to_string())
    );
    let input: serde_json::Value =
        serde_json::from_slice(commands[0].stdin.as_deref().unwrap()).unwrap();
    assert_eq!(input["context"]["director_uuid"], "fake-deployment-uuid");
}

#[tokio::test]
async fn test_install_requires_a_cpi_job() {
    let rel = release(vec![job("fake-helper", &[("helper.erb", "bin/helper")])]);
    let f = fixture(rel.clone());

    let err = f.installer.install(&cpi_manifest(), &rel).await.err().unwrap();

    assert!(err.to_string().contains("bin/cpi"), "{}", err);
}

#[tokio::test]
async fn test_install_surfaces_template_failures() {
    let rel = release(vec![job("fake-cpi", &[("cpi.erb", "/bin/cpi")])]);
    let f = fixture(rel.clone());
    f.renderer.fail_for("", "fake-render-error");

    let err = f.installer.install(&cpi_manifest(), &rel).await.err().unwrap();

    let message = err.to_string();
    assert!(message.contains("Compiling job templates"), "{}", message);
    assert!(message.contains("fake-render-error"), "{}", message);
    assert!(!f.root.path().join("cpi/jobs/fake-cpi").exists());
}
