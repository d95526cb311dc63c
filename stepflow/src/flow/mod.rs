//! Flow programs: the declarative description a run executes.

mod inputs;
mod program;

pub use inputs::InputSpec;
pub use program::{
    CallStep, ComponentDecl, ConditionalSpec, ConditionalStep, FlowProgram, LoopSpec, LoopStep,
    SinkStep, SourceStep, Step,
};
