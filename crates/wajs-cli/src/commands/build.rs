use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use wajs_synth::{EmbeddedFile, SynthOptions};

use crate::config::WajsConfig;

/// Files written by one build.
#[derive(Debug)]
pub struct BuildOutputs {
    pub wasm: PathBuf,
    pub loader: PathBuf,
    pub manifest: PathBuf,
}

impl BuildOutputs {
    pub fn for_stem(stem: &Path) -> Self {
        let with = |suffix: &str| {
            let mut name = stem.as_os_str().to_os_string();
            name.push(suffix);
            PathBuf::from(name)
        };
        Self {
            wasm: with(".wasm"),
            loader: with(".js"),
            manifest: with(".manifest.json"),
        }
    }
}

pub fn default_stem(input: &Path) -> PathBuf {
    input.with_extension("wajs")
}

/// Parse `NAME=PATH`.
pub fn parse_embed(spec: &str) -> Result<(&str, &Path)> {
    match spec.split_once('=') {
        Some((name, path)) if !name.is_empty() && !path.is_empty() => Ok((name, Path::new(path))),
        _ => bail!("--embed expects NAME=PATH, got `{spec}`"),
    }
}

fn read_embed(name: &str, path: &Path) -> Result<EmbeddedFile> {
    let data = fs::read(path).with_context(|| format!("failed to read embedded file {}", path.display()))?;
    log::debug!("embedding {} ({} bytes) as `{name}`", path.display(), data.len());
    Ok(EmbeddedFile::new(name, data))
}

/// Options from the config with command-line overrides applied.
pub fn build_options(config: &WajsConfig, minify: bool, embed: &[String]) -> Result<SynthOptions> {
    let mut opts = config.build.clone();
    opts.minify |= minify;
    for (name, path) in config.embed_paths() {
        opts.embed.push(read_embed(name, &path)?);
    }
    for spec in embed {
        let (name, path) = parse_embed(spec)?;
        opts.embed.retain(|f| f.name != name);
        opts.embed.push(read_embed(name, path)?);
    }
    Ok(opts)
}

pub fn build_file(input: &Path, stem: Option<&Path>, opts: &SynthOptions) -> Result<BuildOutputs> {
    let bytes = fs::read(input).with_context(|| format!("failed to read {}", input.display()))?;
    let artifact = wajs_synth::synthesize(&bytes, opts).map_err(|err| match err.diagnostics() {
        Some(diagnostics) => anyhow::anyhow!("{} is not a valid bridge module:\n{diagnostics}", input.display()),
        None => anyhow::Error::new(err).context(format!("failed to synthesize {}", input.display())),
    })?;
    for warning in &artifact.diagnostics.warnings {
        log::warn!("{warning}");
    }

    let stem = stem.map_or_else(|| default_stem(input), Path::to_path_buf);
    let outputs = BuildOutputs::for_stem(&stem);
    if outputs.wasm == input {
        bail!("output {} would overwrite the input", outputs.wasm.display());
    }
    fs::write(&outputs.wasm, &artifact.wasm)
        .with_context(|| format!("failed to write {}", outputs.wasm.display()))?;
    fs::write(&outputs.loader, &artifact.loader)
        .with_context(|| format!("failed to write {}", outputs.loader.display()))?;
    fs::write(&outputs.manifest, artifact.manifest_json()?)
        .with_context(|| format!("failed to write {}", outputs.manifest.display()))?;
    log::info!(
        "wrote {}, {} and {}",
        outputs.wasm.display(),
        outputs.loader.display(),
        outputs.manifest.display()
    );
    Ok(outputs)
}

pub fn run(config: &WajsConfig, input: &Path, output: Option<&Path>, minify: bool, embed: &[String], json: bool) -> Result<()> {
    let opts = build_options(config, minify, embed)?;
    let outputs = build_file(input, output, &opts)?;
    if json {
        println!("{}", fs::read_to_string(&outputs.manifest)?);
    } else {
        println!("Built {}", outputs.wasm.display());
        println!("      {}", outputs.loader.display());
        println!("      {}", outputs.manifest.display());
    }
    Ok(())
}
