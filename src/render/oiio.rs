//! Color conversion with `oiiotool`.

use super::{ColorConverter, ConvertParams, RenderError};
use crate::config::{ColorConfig, ToolsConfig};
use crate::tools::ToolRunner;

pub struct OiioConverter {
    runner: ToolRunner,
    oiiotool: String,
    input_args: Vec<String>,
    output_args: Vec<String>,
}

impl OiioConverter {
    pub fn new(
        runner: ToolRunner,
        oiiotool: impl Into<String>,
        input_args: Vec<String>,
        output_args: Vec<String>,
    ) -> Self {
        Self {
            runner,
            oiiotool: oiiotool.into(),
            input_args,
            output_args,
        }
    }

    pub fn from_config(tools: &ToolsConfig, color: &ColorConfig) -> Self {
        Self::new(
            ToolRunner::from_config(tools),
            tools.oiiotool.clone(),
            color.input_args.clone(),
            color.output_args.clone(),
        )
    }

    /// `[input_args] -i IN --colorconvert FROM TO [output_args] -o OUT`
    fn args(&self, params: &ConvertParams) -> Vec<String> {
        let mut args = self.input_args.clone();
        args.push("-i".to_string());
        args.push(params.input.display().to_string());
        args.push("--colorconvert".to_string());
        args.push(params.from.clone());
        args.push(params.to.clone());
        args.extend(self.output_args.iter().cloned());
        args.push("-o".to_string());
        args.push(params.output.display().to_string());
        args
    }
}

impl ColorConverter for OiioConverter {
    fn convert(&self, params: &ConvertParams) -> Result<(), RenderError> {
        tracing::debug!(
            "Converting {} from {} to {}",
            params.input.display(),
            params.from,
            params.to
        );
        self.runner.run(&self.oiiotool, self.args(params))?;
        if !params.output.exists() {
            return Err(RenderError::MissingOutput(params.output.clone()));
        }
        Ok(())
    }
}
