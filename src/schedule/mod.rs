/*
MIT License with FEFF10 Attribution

Copyright (c) 2025 Ameyanagi

Based on or developed using Distribution: FEFF10.0
Copyright (c) 2020 FEFF Project, University of Washington and SLAC National Accelerator Laboratory.
All rights reserved.
*/

//! Execution orders and the scheduler that replays them

mod errors;
pub mod instruction;
pub mod order;
pub mod scheduler;

pub use errors::{Result, ScheduleError};
pub use instruction::{Instruction, InstructionKind};
pub use order::{CursorState, ExecutionOrder};
pub use scheduler::Scheduler;
