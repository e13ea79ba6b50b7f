//! # Control-Program Analysis
//!
//! Works out which parts of the font-wide hinting state the retained glyphs
//! can reach: which functions get called, which CVT entries and storage
//! slots get read or written.
//!
//! This is a scanner, not an interpreter. It walks each program linearly
//! with a tiny abstract stack that only knows about pushed constants.
//! Anything it can't pin down statically (a computed index, a value that
//! survived a branch merge or a value live at a jump target) is unknown, and an unknown index means "everything of that
//! kind is referenced". The scanner may keep too much. It never keeps too
//! little.

use std::collections::{BTreeSet, HashMap, HashSet};

use super::opcodes::{OpKind, OpcodeTable};

/// What the retained hinting code touches.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ControlProgramUsage {
    pub cvt: BTreeSet<i32>,
    pub all_cvt: bool,
    pub storage: BTreeSet<i32>,
    pub all_storage: bool,
    pub functions: BTreeSet<i32>,
    pub all_functions: bool,
    /// An opcode outside the defined set was reached, so `IDEF`s matter.
    pub instruction_defs: bool,
    /// Number of programs that ran into a truncated push.
    pub truncated_programs: usize,
}

impl ControlProgramUsage {
    pub fn references_cvt(&self) -> bool {
        self.all_cvt || !self.cvt.is_empty()
    }

    pub fn references_storage(&self) -> bool {
        self.all_storage || !self.storage.is_empty()
    }

    pub fn references_functions(&self) -> bool {
        self.all_functions || !self.functions.is_empty() || self.instruction_defs
    }

    pub fn cvt_referenced(&self, index: i32) -> bool {
        self.all_cvt || self.cvt.contains(&index)
    }

    pub fn storage_referenced(&self, index: i32) -> bool {
        self.all_storage || self.storage.contains(&index)
    }

    pub fn function_referenced(&self, id: i32) -> bool {
        self.all_functions || self.functions.contains(&id)
    }

    fn escalate(&mut self) {
        self.all_cvt = true;
        self.all_storage = true;
        self.all_functions = true;
    }
}

/// One decoded instruction.
#[derive(Debug, Clone, Copy)]
struct Instruction<'a> {
    /// Byte offset of the opcode within its program.
    pc: usize,
    opcode: u8,
    kind: OpKind,
    pops: u8,
    pushes: u8,
    /// Inline push data (after the count byte, for `NPUSH*`).
    inline: &'a [u8],
    words: bool,
}

impl Instruction<'_> {
    fn push_values(&self) -> impl Iterator<Item = i32> + '_ {
        let step = if self.words { 2 } else { 1 };
        self.inline.chunks_exact(step).map(move |c| {
            if self.words {
                i16::from_be_bytes([c[0], c[1]]) as i32
            } else {
                c[0] as i32
            }
        })
    }
}

/// The bytecode ran off the end in the middle of a push.
#[derive(Debug, Clone, Copy)]
struct Truncated;

struct Decoder<'a, 't> {
    opcodes: &'t OpcodeTable,
    bytecode: &'a [u8],
    pc: usize,
}

impl<'a, 't> Decoder<'a, 't> {
    fn new(opcodes: &'t OpcodeTable, bytecode: &'a [u8]) -> Self {
        Decoder {
            opcodes,
            bytecode,
            pc: 0,
        }
    }

    fn next(&mut self) -> Option<Result<Instruction<'a>, Truncated>> {
        let pc = self.pc;
        let opcode = *self.bytecode.get(pc)?;
        let info = self.opcodes.get(opcode);
        let next = self.bytecode.get(self.pc + 1).copied();
        let Some(inline_len) = info.inline_len(next) else {
            self.pc = self.bytecode.len();
            return Some(Err(Truncated));
        };
        let start = self.pc + 1;
        let end = start + inline_len;
        if end > self.bytecode.len() {
            self.pc = self.bytecode.len();
            return Some(Err(Truncated));
        }
        // NPUSH* carry a count byte ahead of the data
        let data_start = match info.kind {
            OpKind::NPushBytes | OpKind::NPushWords => start + 1,
            _ => start,
        };
        self.pc = end;
        Some(Ok(Instruction {
            pc,
            opcode,
            kind: info.kind,
            pops: info.pops,
            pushes: info.pushes,
            inline: &self.bytecode[data_start..end],
            words: matches!(info.kind, OpKind::PushWords(_) | OpKind::NPushWords),
        }))
    }

    /// Advance past the `ENDF` closing the current definition. Returns the
    /// body's byte range, or `None` when the definition never closes.
    fn skip_definition(&mut self) -> Option<std::ops::Range<usize>> {
        let start = self.pc;
        loop {
            let before = self.pc;
            match self.next()? {
                Ok(ins) if ins.kind == OpKind::EndFunction => return Some(start..before),
                Ok(_) => {}
                Err(Truncated) => return None,
            }
        }
    }
}

/// The top of the interpreter stack, as far as it can be known.
///
/// Values below the tracked portion are unknown; popping past the bottom
/// yields `None` rather than failing.
#[derive(Debug, Clone, Default, PartialEq)]
struct AbstractStack {
    values: Vec<Option<i32>>,
}

impl AbstractStack {
    fn push(&mut self, value: Option<i32>) {
        self.values.push(value);
    }

    fn pop(&mut self) -> Option<i32> {
        self.values.pop().flatten()
    }

    fn forget(&mut self) {
        self.values.clear();
    }
}

/// Per-branch stack snapshots for `IF`/`ELSE`/`EIF`.
struct BranchFrame {
    entry: AbstractStack,
    then_exit: Option<AbstractStack>,
}

/// Relative jumps seen during one pass over a program.
#[derive(Debug, Default)]
struct JumpTargets {
    /// Resolved targets, as byte offsets into the program.
    targets: BTreeSet<usize>,
    /// A jump whose offset was unknown, or that landed between
    /// instructions or outside the program.
    unresolved: bool,
}

/// Function and instruction definitions found in `fpgm` and `prep`.
#[derive(Default)]
struct Definitions<'a> {
    functions: HashMap<i32, &'a [u8]>,
    /// Bodies whose function number couldn't be resolved.
    unnumbered: Vec<&'a [u8]>,
    instructions: Vec<&'a [u8]>,
}

/// Scans font, control-value and glyph programs against one opcode table.
pub struct ControlProgramAnalyzer<'t> {
    opcodes: &'t OpcodeTable,
}

impl<'t> ControlProgramAnalyzer<'t> {
    pub fn new(opcodes: &'t OpcodeTable) -> Self {
        ControlProgramAnalyzer { opcodes }
    }

    /// Analyze everything the retained glyphs can reach.
    ///
    /// `fpgm` and `prep` top-level code always runs when hinting is active,
    /// so both count as roots alongside every glyph program.
    pub fn analyze<'a>(
        &self,
        fpgm: Option<&'a [u8]>,
        prep: Option<&'a [u8]>,
        glyph_programs: &[&'a [u8]],
    ) -> ControlProgramUsage {
        let mut usage = ControlProgramUsage::default();
        let mut defs = Definitions::default();
        let mut pending: Vec<&'a [u8]> = Vec::new();

        for program in [fpgm, prep].into_iter().flatten() {
            self.scan(program, &mut usage, &mut pending, Some(&mut defs));
        }
        for &program in glyph_programs {
            self.scan(program, &mut usage, &mut pending, None);
        }
        // IDEF bodies are few; treat them as always reachable
        pending.extend(defs.instructions.iter().copied());

        let mut scanned: HashSet<i32> = HashSet::new();
        let mut expanded_all = false;
        let mut unnumbered_queued = false;
        loop {
            if usage.all_functions && !expanded_all {
                expanded_all = true;
                pending.extend(defs.functions.values().copied());
                scanned.extend(defs.functions.keys().copied());
            }
            // An unnumbered body may be any function number
            if usage.references_functions() && !unnumbered_queued {
                unnumbered_queued = true;
                pending.extend(defs.unnumbered.iter().copied());
            }
            for &id in &usage.functions {
                if scanned.insert(id) {
                    if let Some(&body) = defs.functions.get(&id) {
                        pending.push(body);
                    }
                }
            }
            let Some(body) = pending.pop() else {
                break;
            };
            self.scan(body, &mut usage, &mut pending, None);
        }

        usage
    }

    /// Scan one program. With `defs`, `FDEF`/`IDEF` bodies are recorded for
    /// later; without, they're skipped (a definition inside a glyph or a
    /// function body is not ours to index).
    ///
    /// Programs containing jumps get throwaway passes first, until the set
    /// of resolved jump targets stops growing. The real pass then starts
    /// every target with an unknown stack. A jump that can't be resolved
    /// could land anywhere, so it escalates.
    fn scan<'a>(
        &self,
        program: &'a [u8],
        usage: &mut ControlProgramUsage,
        pending: &mut Vec<&'a [u8]>,
        defs: Option<&mut Definitions<'a>>,
    ) {
        let mut targets = BTreeSet::new();
        if self.has_jumps(program) {
            loop {
                let mut scratch = ControlProgramUsage::default();
                let mut scratch_pending = Vec::new();
                let found =
                    self.scan_pass(program, &mut scratch, &mut scratch_pending, None, &targets);
                if found.targets.is_subset(&targets) {
                    break;
                }
                targets.extend(found.targets);
            }
        }

        let jumps = self.scan_pass(program, usage, pending, defs, &targets);
        if jumps.unresolved {
            log::debug!("unresolved jump in hinting program; keeping all hinting state");
            usage.escalate();
        }
    }

    fn has_jumps(&self, program: &[u8]) -> bool {
        let mut decoder = Decoder::new(self.opcodes, program);
        while let Some(Ok(ins)) = decoder.next() {
            if ins.kind == OpKind::Jump {
                return true;
            }
        }
        false
    }

    /// One linear pass. The stack and loop counter are unknown on arrival
    /// at any offset in `targets`.
    fn scan_pass<'a>(
        &self,
        program: &'a [u8],
        usage: &mut ControlProgramUsage,
        pending: &mut Vec<&'a [u8]>,
        mut defs: Option<&mut Definitions<'a>>,
        targets: &BTreeSet<usize>,
    ) -> JumpTargets {
        let mut decoder = Decoder::new(self.opcodes, program);
        let mut stack = AbstractStack::default();
        let mut branches: Vec<BranchFrame> = Vec::new();
        let mut loop_count: Option<i32> = Some(1);
        let mut jumps = JumpTargets::default();
        let mut boundaries: HashSet<usize> = HashSet::new();

        while let Some(next) = decoder.next() {
            let ins = match next {
                Ok(ins) => ins,
                Err(Truncated) => {
                    log::warn!("hinting program truncated inside a push; keeping all hinting state");
                    usage.truncated_programs += 1;
                    usage.escalate();
                    return jumps;
                }
            };

            boundaries.insert(ins.pc);
            if targets.contains(&ins.pc) {
                stack.forget();
                loop_count = None;
            }

            match ins.kind {
                OpKind::PushBytes(_)
                | OpKind::PushWords(_)
                | OpKind::NPushBytes
                | OpKind::NPushWords => {
                    for value in ins.push_values() {
                        stack.push(Some(value));
                    }
                }
                OpKind::ReadCvt => {
                    mark(stack.pop(), &mut usage.cvt, &mut usage.all_cvt);
                    stack.push(None);
                }
                OpKind::WriteCvt => {
                    stack.pop();
                    mark(stack.pop(), &mut usage.cvt, &mut usage.all_cvt);
                }
                OpKind::CvtOperand => {
                    mark(stack.pop(), &mut usage.cvt, &mut usage.all_cvt);
                    stack.pop();
                }
                OpKind::ReadStorage => {
                    mark(stack.pop(), &mut usage.storage, &mut usage.all_storage);
                    stack.push(None);
                }
                OpKind::WriteStorage => {
                    stack.pop();
                    mark(stack.pop(), &mut usage.storage, &mut usage.all_storage);
                }
                // The callee may have run SLOOP
                OpKind::Call | OpKind::LoopCall => {
                    mark(stack.pop(), &mut usage.functions, &mut usage.all_functions);
                    stack.forget();
                    loop_count = None;
                }
                OpKind::FunctionDef | OpKind::InstructionDef => {
                    let key = stack.pop();
                    let Some(range) = decoder.skip_definition() else {
                        log::warn!("unterminated definition in hinting program; keeping all hinting state");
                        usage.truncated_programs += 1;
                        usage.escalate();
                        return jumps;
                    };
                    let body = &program[range];
                    if let Some(defs) = defs.as_deref_mut() {
                        match (ins.kind, key) {
                            (OpKind::InstructionDef, _) => defs.instructions.push(body),
                            (_, Some(id)) => {
                                defs.functions.insert(id, body);
                            }
                            (_, None) => defs.unnumbered.push(body),
                        }
                    } else {
                        // Definitions outside fpgm/prep: scan them in place
                        pending.push(body);
                    }
                }
                OpKind::EndFunction => {}
                OpKind::If => {
                    stack.pop();
                    branches.push(BranchFrame {
                        entry: stack.clone(),
                        then_exit: None,
                    });
                }
                OpKind::Else => match branches.last_mut() {
                    Some(frame) => {
                        frame.then_exit = Some(std::mem::replace(&mut stack, frame.entry.clone()));
                    }
                    None => stack.forget(),
                },
                OpKind::EndIf => match branches.pop() {
                    Some(frame) => {
                        let other = frame.then_exit.unwrap_or(frame.entry);
                        if other != stack {
                            stack.forget();
                        }
                    }
                    None => stack.forget(),
                },
                OpKind::Jump => {
                    // JROT/JROF pop the condition above the offset
                    if ins.pops == 2 {
                        stack.pop();
                    }
                    let target = stack
                        .pop()
                        .and_then(|offset| ins.pc.checked_add_signed(offset as isize));
                    match target {
                        Some(target) => {
                            jumps.targets.insert(target);
                        }
                        None => jumps.unresolved = true,
                    }
                    stack.forget();
                }
                OpKind::Dup => {
                    let top = stack.pop();
                    stack.push(top);
                    stack.push(top);
                }
                OpKind::Pop => {
                    stack.pop();
                }
                OpKind::Clear => stack.forget(),
                OpKind::Swap => {
                    let a = stack.pop();
                    let b = stack.pop();
                    stack.push(a);
                    stack.push(b);
                }
                OpKind::Depth => stack.push(None),
                OpKind::CIndex => {
                    let copied = stack
                        .pop()
                        .filter(|&k| k >= 1 && (k as usize) <= stack.values.len())
                        .and_then(|k| stack.values[stack.values.len() - k as usize]);
                    stack.push(copied);
                }
                OpKind::MIndex => match stack.pop() {
                    Some(k) if k >= 1 && (k as usize) <= stack.values.len() => {
                        let moved = stack.values.remove(stack.values.len() - k as usize);
                        stack.push(moved);
                    }
                    // Element comes from below the tracked part
                    Some(k) if k >= 1 => stack.push(None),
                    _ => stack.forget(),
                },
                OpKind::Roll => {
                    let c = stack.pop();
                    let b = stack.pop();
                    let a = stack.pop();
                    stack.push(b);
                    stack.push(c);
                    stack.push(a);
                }
                OpKind::SetLoop => {
                    loop_count = stack.pop();
                }
                OpKind::LoopConsumer => {
                    for _ in 0..ins.pops {
                        stack.pop();
                    }
                    match loop_count {
                        Some(n) if n >= 0 => {
                            for _ in 0..n {
                                stack.pop();
                            }
                        }
                        _ => stack.forget(),
                    }
                    loop_count = Some(1);
                }
                OpKind::DeltaPoint => match stack.pop() {
                    Some(n) if n >= 0 => {
                        for _ in 0..n * 2 {
                            stack.pop();
                        }
                    }
                    _ => stack.forget(),
                },
                OpKind::DeltaCvt => match stack.pop() {
                    Some(n) if n >= 0 => {
                        for _ in 0..n {
                            mark(stack.pop(), &mut usage.cvt, &mut usage.all_cvt);
                            stack.pop();
                        }
                    }
                    _ => {
                        usage.all_cvt = true;
                        stack.forget();
                    }
                },
                OpKind::Opaque => stack.forget(),
                OpKind::Undefined => {
                    log::debug!("undefined opcode 0x{:02X} reached; keeping IDEFs", ins.opcode);
                    usage.instruction_defs = true;
                    stack.forget();
                }
                OpKind::Plain => {
                    for _ in 0..ins.pops {
                        stack.pop();
                    }
                    for _ in 0..ins.pushes {
                        stack.push(None);
                    }
                }
            }
        }

        // Landing on the end just stops the program
        if jumps
            .targets
            .iter()
            .any(|t| *t != program.len() && !boundaries.contains(t))
        {
            jumps.unresolved = true;
        }
        jumps
    }
}

fn mark(index: Option<i32>, set: &mut BTreeSet<i32>, all: &mut bool) {
    match index {
        Some(i) => {
            set.insert(i);
        }
        None => *all = true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::font::opcodes::OpcodeTableCell;

    const PUSHB_1: u8 = 0xB0;
    const PUSHB_2: u8 = 0xB1;
    const NPUSHB: u8 = 0x40;
    const PUSHW_1: u8 = 0xB8;
    const RCVT: u8 = 0x45;
    const WCVTP: u8 = 0x44;
    const RS: u8 = 0x43;
    const WS: u8 = 0x42;
    const CALL: u8 = 0x2B;
    const FDEF: u8 = 0x2C;
    const ENDF: u8 = 0x2D;
    const IF: u8 = 0x58;
    const ELSE: u8 = 0x1B;
    const EIF: u8 = 0x59;
    const ADD: u8 = 0x60;
    const MIRP: u8 = 0xE0;
    const DELTAC1: u8 = 0x73;
    const SWAP: u8 = 0x23;
    const POP: u8 = 0x21;
    const PUSHB_3: u8 = 0xB2;
    const JMPR: u8 = 0x1C;
    const JROF: u8 = 0x79;
    const SLOOP: u8 = 0x17;
    const SHP: u8 = 0x32;

    fn analyze(fpgm: Option<&[u8]>, prep: Option<&[u8]>, glyphs: &[&[u8]]) -> ControlProgramUsage {
        let cell = OpcodeTableCell::new();
        ControlProgramAnalyzer::new(cell.get()).analyze(fpgm, prep, glyphs)
    }

    #[test]
    fn test_constant_cvt_reads() {
        let glyph = [PUSHB_1, 7, RCVT, POP, PUSHB_2, 3, 9, MIRP];
        let usage = analyze(None, None, &[&glyph[..]]);
        assert_eq!(usage.cvt.iter().copied().collect::<Vec<_>>(), vec![7, 9]);
        assert!(!usage.all_cvt);
        assert!(!usage.references_functions());
    }

    #[test]
    fn test_cvt_write_uses_second_operand() {
        // WCVTP pops value (top) then index
        let prep = [PUSHB_2, 12, 64, WCVTP];
        let usage = analyze(None, Some(&prep[..]), &[]);
        assert!(usage.cvt_referenced(12));
        assert!(!usage.cvt_referenced(64));
    }

    #[test]
    fn test_computed_index_marks_everything() {
        let glyph = [PUSHB_2, 1, 2, ADD, RCVT];
        let usage = analyze(None, None, &[&glyph[..]]);
        assert!(usage.all_cvt);
        assert!(usage.cvt_referenced(12345));
    }

    #[test]
    fn test_storage_access() {
        let glyph = [PUSHB_2, 4, 99, WS, PUSHB_1, 5, RS];
        let usage = analyze(None, None, &[&glyph[..]]);
        assert_eq!(usage.storage.iter().copied().collect::<Vec<_>>(), vec![4, 5]);
        assert!(usage.references_storage());
    }

    #[test]
    fn test_call_follows_into_function_body() {
        // fpgm: FDEF 0 { PUSHB 20 RCVT } ; FDEF 1 { PUSHB 30 RCVT }
        let fpgm = [
            PUSHB_1, 0, FDEF, PUSHB_1, 20, RCVT, POP, ENDF, PUSHB_1, 1, FDEF, PUSHB_1, 30, RCVT,
            POP, ENDF,
        ];
        let glyph = [PUSHB_1, 1, CALL];
        let usage = analyze(Some(&fpgm[..]), None, &[&glyph[..]]);
        assert_eq!(usage.functions.iter().copied().collect::<Vec<_>>(), vec![1]);
        assert!(usage.cvt_referenced(30));
        assert!(!usage.cvt_referenced(20));
    }

    #[test]
    fn test_nested_calls_are_transitive() {
        // FDEF 0 { PUSHB 1 CALL } ; FDEF 1 { PUSHB 8 RS }
        let fpgm = [
            PUSHB_1, 0, FDEF, PUSHB_1, 1, CALL, ENDF, PUSHB_1, 1, FDEF, PUSHB_1, 8, RS, POP, ENDF,
        ];
        let glyph = [PUSHB_1, 0, CALL];
        let usage = analyze(Some(&fpgm[..]), None, &[&glyph[..]]);
        assert!(usage.function_referenced(0));
        assert!(usage.function_referenced(1));
        assert!(usage.storage_referenced(8));
    }

    #[test]
    fn test_unknown_call_target_keeps_all_functions() {
        let fpgm = [PUSHB_1, 0, FDEF, PUSHB_1, 20, RCVT, POP, ENDF];
        let glyph = [PUSHB_2, 1, 2, ADD, CALL];
        let usage = analyze(Some(&fpgm[..]), None, &[&glyph[..]]);
        assert!(usage.all_functions);
        assert!(usage.cvt_referenced(20));
    }

    #[test]
    fn test_branches_with_equal_stacks_keep_values() {
        // PUSHB 5 ; PUSHB 1 IF PUSHB 2 POP ELSE EIF ; RCVT -> cvt 5
        let glyph = [PUSHB_1, 5, PUSHB_1, 1, IF, PUSHB_1, 2, POP, ELSE, EIF, RCVT];
        let usage = analyze(None, None, &[&glyph[..]]);
        assert_eq!(usage.cvt.iter().copied().collect::<Vec<_>>(), vec![5]);
        assert!(!usage.all_cvt);
    }

    #[test]
    fn test_branches_with_different_stacks_forget() {
        // IF pushes an extra value in one arm only
        let glyph = [PUSHB_1, 5, PUSHB_1, 1, IF, PUSHB_1, 6, EIF, RCVT];
        let usage = analyze(None, None, &[&glyph[..]]);
        assert!(usage.all_cvt);
    }

    #[test]
    fn test_delta_cvt_pairs() {
        // DELTAC1 with 2 pairs: stack (bottom→top) arg2 c2 arg1 c1 n
        let glyph = [NPUSHB, 5, 0x11, 40, 0x22, 41, 2, DELTAC1];
        let usage = analyze(None, None, &[&glyph[..]]);
        assert_eq!(usage.cvt.iter().copied().collect::<Vec<_>>(), vec![40, 41]);
    }

    #[test]
    fn test_swap_and_word_push() {
        let glyph = [PUSHW_1, 0x01, 0x00, PUSHB_1, 3, SWAP, RCVT];
        let usage = analyze(None, None, &[&glyph[..]]);
        assert!(usage.cvt_referenced(256));
        assert!(!usage.cvt_referenced(3));
    }

    #[test]
    fn test_truncated_push_escalates() {
        let glyph = [NPUSHB, 10, 1, 2];
        let usage = analyze(None, None, &[&glyph[..]]);
        assert_eq!(usage.truncated_programs, 1);
        assert!(usage.all_cvt && usage.all_storage && usage.all_functions);
    }

    #[test]
    fn test_undefined_opcode_flags_idefs() {
        let glyph = [0x93];
        let usage = analyze(None, None, &[&glyph[..]]);
        assert!(usage.instruction_defs);
        assert!(usage.references_functions());
    }

    #[test]
    fn test_no_programs_no_usage() {
        let usage = analyze(None, None, &[]);
        assert_eq!(usage, ControlProgramUsage::default());
    }

    #[test]
    fn test_forward_jump_target_starts_unknown() {
        // FDEF 0 { PUSHB 2 RCVT POP } ; FDEF 1 { PUSHB 0 POP }
        let fpgm = [
            PUSHB_1, 0, FDEF, PUSHB_1, 2, RCVT, POP, ENDF, PUSHB_1, 1, FDEF, PUSHB_1, 0, POP,
            ENDF,
        ];
        // JMPR +3 skips PUSHB 1, so CALL really takes the 0 pushed first
        let glyph = [PUSHB_1, 0, PUSHB_1, 3, JMPR, PUSHB_1, 1, CALL];
        let usage = analyze(Some(&fpgm[..]), None, &[&glyph[..]]);
        assert!(usage.function_referenced(0));
        assert!(usage.cvt_referenced(2));
    }

    #[test]
    fn test_backward_jump_target_starts_unknown() {
        // 0: PUSHB 3 ; 2: RCVT POP ; 4: PUSHB 7 ; 6: PUSHW -7 ; 9: JMPR -> 2
        let glyph = [PUSHB_1, 3, RCVT, POP, PUSHB_1, 7, PUSHW_1, 0xFF, 0xF9, JMPR];
        let usage = analyze(None, None, &[&glyph[..]]);
        assert!(usage.cvt_referenced(7));
        assert!(usage.all_cvt);
    }

    #[test]
    fn test_conditional_jump_keeps_fall_through_operands() {
        // 0: PUSHB 4 ; 2: PUSHB 0 ; 4: JROF -> 8 (end) ; 5: PUSHB 9 ; 7: RCVT
        // The pushes after the jump are still known on the fall-through path
        let glyph = [PUSHB_1, 4, PUSHB_1, 0, JROF, PUSHB_1, 9, RCVT];
        let usage = analyze(None, None, &[&glyph[..]]);
        assert_eq!(usage.cvt.iter().copied().collect::<Vec<_>>(), vec![9]);
        assert!(!usage.all_cvt);
        assert!(!usage.all_functions);
    }

    #[test]
    fn test_unknown_jump_offset_escalates() {
        let glyph = [PUSHB_2, 1, 2, ADD, JMPR, PUSHB_1, 5, RCVT];
        let usage = analyze(None, None, &[&glyph[..]]);
        assert!(usage.all_cvt && usage.all_storage && usage.all_functions);
        assert_eq!(usage.truncated_programs, 0);
    }

    #[test]
    fn test_jump_into_push_data_escalates() {
        // JMPR +2 lands on the data byte of PUSHB 0x45
        let glyph = [PUSHB_1, 2, JMPR, PUSHB_1, RCVT, POP];
        let usage = analyze(None, None, &[&glyph[..]]);
        assert!(usage.all_cvt);
    }

    #[test]
    fn test_jump_to_end_of_program_is_resolved() {
        let glyph = [PUSHB_1, 6, RCVT, PUSHB_1, 2, JMPR, POP];
        let usage = analyze(None, None, &[&glyph[..]]);
        assert_eq!(usage.cvt.iter().copied().collect::<Vec<_>>(), vec![6]);
        assert!(!usage.all_cvt);
    }

    #[test]
    fn test_loop_count_unknown_after_call() {
        // FDEF 0 { PUSHB 2 SLOOP }
        let fpgm = [PUSHB_1, 0, FDEF, PUSHB_1, 2, SLOOP, ENDF];
        // SHP consumes both 5 and 4 under the callee's loop count,
        // leaving 11 for RCVT
        let glyph = [PUSHB_1, 0, CALL, PUSHB_3, 11, 4, 5, SHP, RCVT];
        let usage = analyze(Some(&fpgm[..]), None, &[&glyph[..]]);
        assert!(usage.cvt_referenced(11));
    }

    #[test]
    fn test_known_loop_count_pops_exactly() {
        let glyph = [PUSHB_3, 11, 4, 5, PUSHB_1, 2, SLOOP, SHP, RCVT];
        let usage = analyze(None, None, &[&glyph[..]]);
        assert_eq!(usage.cvt.iter().copied().collect::<Vec<_>>(), vec![11]);
        assert!(!usage.all_cvt);
    }
}
