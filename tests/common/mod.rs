#![allow(dead_code)]

use std::sync::Arc;

use vibwa::{
    compute::ShaderCode,
    vulkan::{Device, DeviceOptions},
};

/// `void main() {}` with `local_size = 1`: OpEntryPoint GLCompute %main "main".
pub const NOOP_COMPUTE_SPIRV: [u32; 35] = [
    0x0723_0203, 0x0001_0000, 0, 5, 0, // header, bound 5
    0x0002_0011, 1, // OpCapability Shader
    0x0003_000E, 0, 1, // OpMemoryModel Logical GLSL450
    0x0005_000F, 5, 3, 0x6E69_616D, 0, // OpEntryPoint GLCompute %3 "main"
    0x0006_0010, 3, 17, 1, 1, 1, // OpExecutionMode %3 LocalSize 1 1 1
    0x0002_0013, 1, // %1 = OpTypeVoid
    0x0003_0021, 2, 1, // %2 = OpTypeFunction %1
    0x0005_0036, 1, 3, 0, 2, // %3 = OpFunction %1 None %2
    0x0002_00F8, 4, // %4 = OpLabel
    0x0001_00FD, // OpReturn
    0x0001_0038, // OpFunctionEnd
];

const OP_CAPABILITY: u32 = 17;
const OP_MEMORY_MODEL: u32 = 14;
const OP_ENTRY_POINT: u32 = 15;
const OP_EXECUTION_MODE: u32 = 16;
const OP_DECORATE: u32 = 71;
const OP_MEMBER_DECORATE: u32 = 72;
const OP_TYPE_VOID: u32 = 19;
const OP_TYPE_FUNCTION: u32 = 33;
const OP_TYPE_INT: u32 = 21;
const OP_TYPE_VECTOR: u32 = 23;
const OP_TYPE_ARRAY: u32 = 28;
const OP_TYPE_RUNTIME_ARRAY: u32 = 29;
const OP_TYPE_STRUCT: u32 = 30;
const OP_TYPE_POINTER: u32 = 32;
const OP_CONSTANT: u32 = 43;
const OP_VARIABLE: u32 = 59;
const OP_FUNCTION: u32 = 54;
const OP_LABEL: u32 = 248;
const OP_LOAD: u32 = 61;
const OP_STORE: u32 = 62;
const OP_ACCESS_CHAIN: u32 = 65;
const OP_COMPOSITE_EXTRACT: u32 = 81;
const OP_RETURN: u32 = 253;
const OP_FUNCTION_END: u32 = 56;

const STORAGE_INPUT: u32 = 1;
const STORAGE_BUFFER: u32 = 12;

const DECORATION_BLOCK: u32 = 2;
const DECORATION_ARRAY_STRIDE: u32 = 6;
const DECORATION_BUILTIN: u32 = 11;
const DECORATION_BINDING: u32 = 33;
const DECORATION_DESCRIPTOR_SET: u32 = 34;
const DECORATION_OFFSET: u32 = 35;

const BUILTIN_LOCAL_INVOCATION_ID: u32 = 27;
const BUILTIN_GLOBAL_INVOCATION_ID: u32 = 28;

fn op(words: &mut Vec<u32>, opcode: u32, operands: &[u32]) {
    words.push(((operands.len() as u32 + 1) << 16) | opcode);
    words.extend_from_slice(operands);
}

fn literal_string(text: &str) -> Vec<u32> {
    let mut bytes = text.as_bytes().to_vec();
    bytes.push(0);
    bytes.resize(bytes.len().div_ceil(4) * 4, 0);
    bytes
        .chunks_exact(4)
        .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

/// SPIR-V 1.3 compute shader copying `uint` data from (set 0, binding 0) to (set 0, binding 2).
///
/// With `array_len == None` both bindings are single buffers indexed by
/// `gl_GlobalInvocationID.x`. With `Some(n)` both are `n`-element buffer arrays, and every
/// invocation copies `gl_LocalInvocationID.x` in each element using constant array indices.
pub fn copy_shader(local_size: u32, array_len: Option<u32>) -> ShaderCode {
    let mut bound = 1;
    let mut id = || {
        let next = bound;
        bound += 1;
        next
    };

    let void = id();
    let fn_ty = id();
    let uint = id();
    let uvec3 = id();
    let ptr_input = id();
    let invocation = id();
    let runtime = id();
    let block = id();
    let ptr_uint = id();
    let zero = id();

    let mut globals = Vec::new();
    op(&mut globals, OP_TYPE_VOID, &[void]);
    op(&mut globals, OP_TYPE_FUNCTION, &[fn_ty, void]);
    op(&mut globals, OP_TYPE_INT, &[uint, 32, 0]);
    op(&mut globals, OP_TYPE_VECTOR, &[uvec3, uint, 3]);
    op(&mut globals, OP_TYPE_POINTER, &[ptr_input, STORAGE_INPUT, uvec3]);
    op(&mut globals, OP_VARIABLE, &[ptr_input, invocation, STORAGE_INPUT]);
    op(&mut globals, OP_TYPE_RUNTIME_ARRAY, &[runtime, uint]);
    op(&mut globals, OP_TYPE_STRUCT, &[block, runtime]);
    op(&mut globals, OP_TYPE_POINTER, &[ptr_uint, STORAGE_BUFFER, uint]);
    op(&mut globals, OP_CONSTANT, &[uint, zero, 0]);

    // Constant array indices, one per copied array element.
    let (binding_ty, elements) = match array_len {
        None => (block, vec![None]),
        Some(len) => {
            let len_id = id();
            op(&mut globals, OP_CONSTANT, &[uint, len_id, len]);
            let array = id();
            op(&mut globals, OP_TYPE_ARRAY, &[array, block, len_id]);
            let mut elements = vec![Some(zero)];
            for k in 1..len {
                let k_id = id();
                op(&mut globals, OP_CONSTANT, &[uint, k_id, k]);
                elements.push(Some(k_id));
            }
            (array, elements)
        }
    };
    let ptr_binding = id();
    op(&mut globals, OP_TYPE_POINTER, &[ptr_binding, STORAGE_BUFFER, binding_ty]);
    let src = id();
    op(&mut globals, OP_VARIABLE, &[ptr_binding, src, STORAGE_BUFFER]);
    let dst = id();
    op(&mut globals, OP_VARIABLE, &[ptr_binding, dst, STORAGE_BUFFER]);

    let builtin = if array_len.is_some() {
        BUILTIN_LOCAL_INVOCATION_ID
    } else {
        BUILTIN_GLOBAL_INVOCATION_ID
    };
    let mut annotations = Vec::new();
    op(&mut annotations, OP_DECORATE, &[invocation, DECORATION_BUILTIN, builtin]);
    op(&mut annotations, OP_DECORATE, &[runtime, DECORATION_ARRAY_STRIDE, 4]);
    op(&mut annotations, OP_MEMBER_DECORATE, &[block, 0, DECORATION_OFFSET, 0]);
    op(&mut annotations, OP_DECORATE, &[block, DECORATION_BLOCK]);
    for (var, binding) in [(src, 0), (dst, 2)] {
        op(&mut annotations, OP_DECORATE, &[var, DECORATION_DESCRIPTOR_SET, 0]);
        op(&mut annotations, OP_DECORATE, &[var, DECORATION_BINDING, binding]);
    }

    let main = id();
    let mut function = Vec::new();
    op(&mut function, OP_FUNCTION, &[void, main, 0, fn_ty]);
    op(&mut function, OP_LABEL, &[id()]);
    let loaded = id();
    op(&mut function, OP_LOAD, &[uvec3, loaded, invocation]);
    let index = id();
    op(&mut function, OP_COMPOSITE_EXTRACT, &[uint, index, loaded, 0]);
    for element in elements {
        let chain = |result: u32, base: u32| {
            let mut operands = vec![ptr_uint, result, base];
            operands.extend(element);
            operands.extend([zero, index]);
            operands
        };
        let src_ptr = id();
        op(&mut function, OP_ACCESS_CHAIN, &chain(src_ptr, src));
        let value = id();
        op(&mut function, OP_LOAD, &[uint, value, src_ptr]);
        let dst_ptr = id();
        op(&mut function, OP_ACCESS_CHAIN, &chain(dst_ptr, dst));
        op(&mut function, OP_STORE, &[dst_ptr, value]);
    }
    op(&mut function, OP_RETURN, &[]);
    op(&mut function, OP_FUNCTION_END, &[]);

    let mut entry = vec![5, main];
    entry.extend(literal_string("main"));
    entry.push(invocation);

    let mut words = vec![0x0723_0203, 0x0001_0300, 0, bound, 0];
    op(&mut words, OP_CAPABILITY, &[1]);
    op(&mut words, OP_MEMORY_MODEL, &[0, 1]);
    op(&mut words, OP_ENTRY_POINT, &entry);
    op(&mut words, OP_EXECUTION_MODE, &[main, 17, local_size, 1, 1]);
    words.extend(annotations);
    words.extend(globals);
    words.extend(function);

    ShaderCode::from_words(words).unwrap()
}

pub fn noop_shader() -> ShaderCode {
    ShaderCode::from_words(NOOP_COMPUTE_SPIRV.to_vec()).unwrap()
}

/// The first usable device, or `None` on machines without Vulkan.
pub fn device() -> Option<Arc<Device>> {
    match Device::create(DeviceOptions::default()) {
        Ok(device) => Some(device),
        Err(e) => {
            eprintln!("skipping GPU test, no device: {e:#}");
            None
        }
    }
}
